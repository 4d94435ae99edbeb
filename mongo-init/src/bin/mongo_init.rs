//! MongoDB first-start bootstrap
//!
//! Runs once when the data store is first provisioned, before it takes
//! application traffic (for example from `docker-entrypoint-initdb.d`).
//! Re-running against a bootstrapped store is a no-op under the default
//! duplicate policy.
//!
//! Exit status: 0 on success, 78 on invalid configuration, 69 when the store
//! never became reachable, 1 otherwise.

use common::{init_logging, Telemetry, TelemetryEvent};
use mongo_init::{
    bootstrap_with_retry, BootstrapConfig, BootstrapError, MongoShell, RetryPolicy, StoreConfig,
};
use std::time::Instant;
use tracing::{error, info};

const COMPONENT: &str = "mongo-init";

/// Log and report `err`, returning the exit status to use.
async fn report_failure(
    telemetry: &Telemetry,
    database: &str,
    phase: &str,
    err: BootstrapError,
) -> i32 {
    error!(error = %err, phase, "Bootstrap failed");
    telemetry
        .send(TelemetryEvent::BootstrapFailed {
            database: database.to_string(),
            error: err.to_string(),
            phase: phase.to_string(),
        })
        .await;
    err.exit_code()
}

#[tokio::main]
async fn main() {
    let _guard = init_logging(COMPONENT);

    let start = Instant::now();
    let telemetry = Telemetry::from_env(COMPONENT);

    telemetry
        .send(TelemetryEvent::ComponentStarted {
            component: COMPONENT.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
        .await;

    let config = match BootstrapConfig::from_env() {
        Ok(c) => c,
        Err(e) => std::process::exit(report_failure(&telemetry, "", "read_config", e).await),
    };

    if let Err(e) = config.validate() {
        std::process::exit(report_failure(&telemetry, &config.database, "validate_config", e).await);
    }

    let store_config = match StoreConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            let err = BootstrapError::invalid_config(format!("{:#}", e));
            std::process::exit(
                report_failure(&telemetry, &config.database, "read_store_config", err).await,
            )
        }
    };
    let policy = RetryPolicy::from_env();

    info!(
        uri = %store_config.redacted_uri(),
        database = %config.database,
        username = %config.username,
        role = %config.role,
        policy = ?config.duplicate_policy,
        "Bootstrap starting"
    );

    telemetry
        .send(TelemetryEvent::BootstrapStarted {
            database: config.database.clone(),
            username: config.username.clone(),
        })
        .await;

    let store = MongoShell::new(store_config);

    let outcome = match bootstrap_with_retry(&store, &config, &policy, &telemetry).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let phase = e.phase();
            std::process::exit(report_failure(&telemetry, &config.database, phase, e).await)
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    telemetry
        .send(TelemetryEvent::BootstrapCompleted {
            database: config.database.clone(),
            username: config.username.clone(),
            outcome: outcome.as_str().to_string(),
            duration_ms,
        })
        .await;

    info!(duration_ms, outcome = outcome.as_str(), "Bootstrap completed");
}
