use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use prior_auth_api::http::ErrorBody;
use prior_auth_api::models::{PriorAuthRecord, PriorAuthRequest};

#[derive(Parser)]
#[command(name = "prior-auth-cli")]
#[command(about = "Command-line client for the Prior Authorization API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service and database health
    Health,
    /// Submit a prior authorization request
    Submit {
        #[arg(long)]
        member: String,
        #[arg(long)]
        npi: String,
        #[arg(long)]
        diagnosis: String,
        #[arg(long)]
        service: String,
    },
    /// List the most recent requests
    List,
    /// Show the audit trail of a request
    Logs { request_id: String },
    /// Trigger a synthetic error (database_timeout, validation_error, ...)
    TriggerError { error_type: String },
    /// Dump Prometheus metrics
    Metrics,
    /// Run the end-to-end demo workload
    Demo {
        /// Submit the valid requests concurrently
        #[arg(long)]
        concurrent: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Submit {
            member,
            npi,
            diagnosis,
            service,
        } => {
            let body = PriorAuthRequest {
                member_id: member,
                provider_npi: npi,
                diagnosis_code: diagnosis,
                requested_service: service,
            };
            let res = client
                .post(format!("{}/prior-auth/submit", base))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::List => {
            let res = client.get(format!("{}/prior-auth/requests", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Logs { request_id } => {
            let res = client
                .get(format!("{}/prior-auth/requests/{}/logs", base, request_id))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::TriggerError { error_type } => {
            let res = client
                .post(format!("{}/prior-auth/test/errors", base))
                .json(&json!({ "error_type": error_type }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if status.is_success() {
                print!("{}", text);
            } else {
                eprintln!("Error: API returned status {}", status);
                eprintln!("Response: {}", text);
            }
        }
        Commands::Demo { concurrent } => {
            if let Err(e) = run_demo(&client, &base, concurrent).await {
                if e.is_connect() {
                    eprintln!("Cannot connect to {}. Is the server running?", base);
                } else {
                    eprintln!("Demo failed: {}", e);
                }
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        let text = res.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => eprintln!("{} ({})", body.detail, body.reason),
            Err(_) => eprintln!("Response: {}", text),
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {}", title);
    println!("{}\n", "=".repeat(60));
}

fn request(member: &str, npi: &str, diagnosis: &str, service: &str) -> PriorAuthRequest {
    PriorAuthRequest {
        member_id: member.to_string(),
        provider_npi: npi.to_string(),
        diagnosis_code: diagnosis.to_string(),
        requested_service: service.to_string(),
    }
}

async fn submit(
    client: &reqwest::Client,
    base: &str,
    body: &PriorAuthRequest,
) -> Result<Result<PriorAuthRecord, String>, reqwest::Error> {
    let res = client
        .post(format!("{}/prior-auth/submit", base))
        .json(body)
        .send()
        .await?;
    let status = res.status();
    if status.is_success() {
        return Ok(Ok(res.json().await?));
    }
    let text = res.text().await?;
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.detail)
        .unwrap_or(text);
    Ok(Err(format!("{}: {}", status.as_u16(), detail)))
}

async fn run_demo(client: &reqwest::Client, base: &str, concurrent: bool) -> Result<(), reqwest::Error> {
    section("1. HEALTH CHECK");
    let res = client.get(format!("{}/health", base)).send().await?;
    println!("Status: {}", res.status());
    println!("Response: {}", res.text().await?);

    section("2. SUBMITTING VALID PRIOR AUTH REQUESTS");
    let valid = [
        request("M10001", "1234567890", "E11.9", "MRI_BRAIN"),
        request("M10002", "9876543210", "I10", "CT_CHEST"),
        request("M10003", "5555555555", "J44.0", "XRAY_CHEST"),
        request("M10004", "1111111111", "Z23", "ECHO_CARDIO"),
        request("M10005", "2222222222", "M79.3", "PHYSICAL_THERAPY"),
    ];
    let mut created: Vec<String> = Vec::new();
    if concurrent {
        println!("Submitting {} requests concurrently", valid.len());
        let results = join_all(valid.iter().map(|body| submit(client, base, body))).await;
        for (body, result) in valid.iter().zip(results) {
            match result? {
                Ok(record) => {
                    println!("   {} -> {} ({})", body.member_id, record.request_id, record.status.as_str());
                    created.push(record.request_id.to_string());
                }
                Err(e) => println!("   {} -> failed {}", body.member_id, e),
            }
        }
    } else {
        for (i, body) in valid.iter().enumerate() {
            println!("Submitting request {}/{}: member {}", i + 1, valid.len(), body.member_id);
            match submit(client, base, body).await? {
                Ok(record) => {
                    println!("   Created: {} - Status: {}", record.request_id, record.status.as_str());
                    created.push(record.request_id.to_string());
                }
                Err(e) => println!("   Failed: {}", e),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    section("3. SUBMITTING INVALID REQUESTS");
    let invalid = [
        request("M20001", "BAD_NPI", "E11", "TEST"),
        request("M20002", "ABCDEFGHIJ", "E11", "TEST"),
        request("M20003", "123", "E11", "TEST"),
    ];
    for (i, body) in invalid.iter().enumerate() {
        println!("Submitting invalid request {}/{}: NPI={}", i + 1, invalid.len(), body.provider_npi);
        match submit(client, base, body).await? {
            Ok(record) => println!("   Unexpectedly accepted as {}", record.request_id),
            Err(e) => println!("   Expected failure: {}", e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    section("4. TRIGGERING TEST ERRORS");
    for error_type in ["validation_error", "database_timeout"] {
        println!("Triggering: {}", error_type);
        let started = Instant::now();
        let res = client
            .post(format!("{}/prior-auth/test/errors", base))
            .json(&json!({ "error_type": error_type }))
            .send()
            .await?;
        println!(
            "   Status: {} (took {:.2}s)",
            res.status(),
            started.elapsed().as_secs_f64()
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    section("5. LISTING ALL PRIOR AUTH REQUESTS");
    let records: Vec<PriorAuthRecord> = client
        .get(format!("{}/prior-auth/requests", base))
        .send()
        .await?
        .json()
        .await?;
    println!("Total requests returned: {}", records.len());
    println!("\nMost recent 5:");
    for record in records.iter().take(5) {
        println!(
            "  {} | {} | {} | {}",
            record.request_id,
            record.member_id,
            record.status.as_str(),
            record.created_at.to_rfc3339()
        );
    }

    if let Some(request_id) = created.first() {
        section("6. AUDIT TRAIL");
        let trail: Value = client
            .get(format!("{}/prior-auth/requests/{}/logs", base, request_id))
            .send()
            .await?
            .json()
            .await?;
        println!("{}", serde_json::to_string_pretty(&trail).unwrap_or_default());
    }

    Ok(())
}
