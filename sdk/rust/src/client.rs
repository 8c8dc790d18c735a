use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub member_id: String,
    pub provider_npi: String,
    pub diagnosis_code: String,
    pub requested_service: String,
}

impl Submission {
    pub fn new(member_id: &str, provider_npi: &str, diagnosis_code: &str, requested_service: &str) -> Self {
        Self {
            member_id: member_id.to_string(),
            provider_npi: provider_npi.to_string(),
            diagnosis_code: diagnosis_code.to_string(),
            requested_service: requested_service.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorAuthRecord {
    pub id: i64,
    pub request_id: String,
    pub member_id: String,
    pub provider_npi: String,
    pub diagnosis_code: String,
    pub requested_service: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub request_id: String,
    pub event_type: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub request_id: String,
    pub events: Vec<AuditEvent>,
}

impl AuditTrail {
    pub fn event_types(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_type.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAck {
    pub error_triggered: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
    reason: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("API returned {status}: {detail} ({reason})")]
    Api {
        status: StatusCode,
        detail: String,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ClientError::Api { reason, .. } => Some(reason),
            ClientError::Transport(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct PriorAuthClient {
    client: Client,
    base_url: String,
}

impl PriorAuthClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn service_info(&self) -> Result<ServiceInfo, ClientError> {
        let resp = self.client.get(self.url("/")).send().await?;
        decode(resp).await
    }

    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let resp = self.client.get(self.url("/health")).send().await?;
        decode(resp).await
    }

    /// Submit a request. A 201 yields the stored record.
    pub async fn submit(&self, submission: &Submission) -> Result<PriorAuthRecord, ClientError> {
        let resp = self
            .client
            .post(self.url("/prior-auth/submit"))
            .json(submission)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn list_requests(&self) -> Result<Vec<PriorAuthRecord>, ClientError> {
        let resp = self.client.get(self.url("/prior-auth/requests")).send().await?;
        decode(resp).await
    }

    pub async fn audit_trail(&self, request_id: &str) -> Result<AuditTrail, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/prior-auth/requests/{}/logs", request_id)))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn trigger_error(&self, error_type: &str) -> Result<ErrorAck, ClientError> {
        let resp = self
            .client
            .post(self.url("/prior-auth/test/errors"))
            .json(&serde_json::json!({ "error_type": error_type }))
            .send()
            .await?;
        decode(resp).await
    }

    /// Raw Prometheus exposition text.
    pub async fn metrics(&self) -> Result<String, ClientError> {
        let resp = self.client.get(self.url("/metrics")).send().await?;
        let resp = check(resp).await?;
        Ok(resp.text().await?)
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let (detail, reason) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.detail, body.reason),
        Err(_) => (text, String::new()),
    };
    Err(ClientError::Api {
        status,
        detail,
        reason,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let resp = check(resp).await?;
    Ok(resp.json::<T>().await?)
}
