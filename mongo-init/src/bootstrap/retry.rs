//! Waiting for the store to come up
//!
//! The initializer itself never retries. The binary wraps it with
//! [`bootstrap_with_retry`], which retries `StoreUnavailable` only, with
//! exponential backoff and a fixed budget.

use super::config::BootstrapConfig;
use super::initializer::{bootstrap, Outcome};
use crate::error::BootstrapError;
use crate::store::Store;
use common::{ConfigExt, Telemetry, TelemetryEvent};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 30,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// Load retry settings from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: u32::env_parse("MONGO_INIT_MAX_RETRIES", defaults.max_retries),
            initial_delay: Duration::from_secs(u64::env_parse(
                "MONGO_INIT_RETRY_DELAY",
                defaults.initial_delay.as_secs(),
            )),
            max_delay: Duration::from_secs(u64::env_parse(
                "MONGO_INIT_MAX_RETRY_DELAY",
                defaults.max_delay.as_secs(),
            )),
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run [`bootstrap`], retrying while the store is unavailable.
///
/// Every other error is returned on the first occurrence. Retrying is safe:
/// `StoreUnavailable` means nothing was written, and a user created by an
/// attempt whose reply got lost is recognised as already bootstrapped.
pub async fn bootstrap_with_retry<S: Store>(
    store: &S,
    config: &BootstrapConfig,
    policy: &RetryPolicy,
    telemetry: &Telemetry,
) -> Result<Outcome, BootstrapError> {
    let mut retry = 0;

    loop {
        match bootstrap(store, config).await {
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    attempt = retry,
                    max_attempts = policy.max_retries,
                    delay = ?delay,
                    error = %e,
                    "Store unavailable, retrying"
                );
                telemetry
                    .send(TelemetryEvent::StoreWaiting {
                        attempt: retry,
                        max_attempts: policy.max_retries,
                        error: e.to_string(),
                    })
                    .await;
                sleep(delay).await;
            }
            result => return result,
        }
    }
}
