//! Telemetry for reporting bootstrap events
//!
//! Events are always logged locally. When `MONGO_INIT_TELEMETRY_URL` is set
//! they are also posted there as JSON.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// All telemetry events emitted by mongo-init.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Component started
    ComponentStarted { component: String, version: String },

    /// Bootstrap process started
    BootstrapStarted { database: String, username: String },

    /// Store not reachable yet, waiting before the next attempt
    StoreWaiting {
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// Bootstrap completed successfully
    BootstrapCompleted {
        database: String,
        username: String,
        outcome: String,
        duration_ms: u64,
    },

    /// Bootstrap failed
    BootstrapFailed {
        database: String,
        error: String,
        phase: String,
    },
}

impl TelemetryEvent {
    /// Get the event type name for logging and the reporting endpoint.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ComponentStarted { .. } => "COMPONENT_STARTED",
            Self::BootstrapStarted { .. } => "MONGO_INIT_BOOTSTRAP_STARTED",
            Self::StoreWaiting { .. } => "MONGO_INIT_STORE_WAITING",
            Self::BootstrapCompleted { .. } => "MONGO_INIT_BOOTSTRAP_COMPLETED",
            Self::BootstrapFailed { .. } => "MONGO_INIT_BOOTSTRAP_FAILED",
        }
    }

    /// Convert event to a human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::ComponentStarted { component, version } => {
                format!("{} v{} started", component, version)
            }
            Self::BootstrapStarted { database, username } => {
                format!("Bootstrap started for {}@{}", username, database)
            }
            Self::StoreWaiting {
                attempt,
                max_attempts,
                error,
            } => {
                format!(
                    "Store unavailable ({}/{}): {}",
                    attempt, max_attempts, error
                )
            }
            Self::BootstrapCompleted {
                database,
                username,
                outcome,
                duration_ms,
            } => {
                format!(
                    "Bootstrap {} for {}@{} in {}ms",
                    outcome, username, database, duration_ms
                )
            }
            Self::BootstrapFailed {
                database,
                error,
                phase,
            } => {
                format!("Bootstrap failed on {} during {}: {}", database, phase, error)
            }
        }
    }
}

/// Telemetry client for reporting events.
#[derive(Clone)]
pub struct Telemetry {
    client: Client,
    endpoint: Option<String>,
    component: String,
    host: String,
}

impl Telemetry {
    /// Create a new telemetry client from environment variables.
    pub fn from_env(component: &str) -> Self {
        Self::new(component, env::var("MONGO_INIT_TELEMETRY_URL").ok())
    }

    /// Create a telemetry client posting to `endpoint`, or only logging when `None`.
    pub fn new(component: &str, endpoint: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.filter(|e| !e.is_empty()),
            component: component.to_string(),
            host: env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    /// Whether events are forwarded anywhere beyond the local log.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Build the JSON body posted for `event`.
    pub fn payload(&self, event: &TelemetryEvent) -> Value {
        json!({
            "event": event.event_type(),
            "message": event.message(),
            "component": self.component,
            "host": self.host,
            "data": event,
        })
    }

    /// Send a telemetry event.
    ///
    /// Errors are logged but do not affect the caller.
    pub async fn send(&self, event: TelemetryEvent) {
        let event_type = event.event_type();

        // Log locally first
        info!(event = %event_type, "{}", event.message());

        let Some(endpoint) = &self.endpoint else {
            return;
        };

        match self
            .client
            .post(endpoint)
            .json(&self.payload(&event))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!("Telemetry got status {}", resp.status());
            }
            Err(e) => {
                warn!("Telemetry send failed: {}", e);
            }
        }
    }
}
