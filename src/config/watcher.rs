//! Hot reload of the configuration file.
//!
//! Only the `latency_injection` section is applied live; the server logs a
//! reminder when a reload touches anything that needs a restart.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Stream of validated configurations produced by a [`ConfigWatcher`].
pub type ConfigUpdates = mpsc::UnboundedReceiver<AppConfig>;

pub struct ConfigWatcher {
    path: PathBuf,
    current: AppConfig,
    updates: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the process started with; reloads are
    /// compared against it to report restart-only changes.
    pub fn new(path: &Path, current: AppConfig) -> (Self, ConfigUpdates) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            current,
            updates,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }

                match load_config(&watched) {
                    Ok(reloaded) => {
                        if requires_restart(&current, &reloaded) {
                            tracing::warn!(
                                path = ?watched,
                                "Only latency injection is reloaded live; restart to apply other changes"
                            );
                        }
                        let _ = updates.send(reloaded);
                    }
                    Err(e) => tracing::error!(
                        error = %e,
                        "Config reload rejected, keeping current settings"
                    ),
                }
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Watching configuration file");
        Ok(watcher)
    }
}

fn requires_restart(current: &AppConfig, reloaded: &AppConfig) -> bool {
    let mut comparable = reloaded.clone();
    comparable.latency_injection = current.latency_injection.clone();
    comparable != *current
}
