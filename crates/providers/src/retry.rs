//! Gateway retries with exponential backoff and per-attempt timeouts.
//!
//! Only transport-level failures ([`GatewayError::is_retryable`]) are retried.
//! Schema, authentication, and malformed-response errors are returned at once.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use toolwright_core::error::GatewayError;
use toolwright_core::gateway::*;
use tracing::{info, warn};

/// How many times and how patiently to retry a gateway call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a single attempt; `None` waits indefinitely.
    pub attempt_timeout: Option<Duration>,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            attempt_timeout: Some(Duration::from_secs(60)),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries, no per-attempt timeout.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            attempt_timeout: None,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server-provided `retry_after` wins over the computed backoff but is
    /// still capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_backoff);
        }

        let factor = 2u32.saturating_pow(attempt);
        let base = self.initial_backoff.saturating_mul(factor).min(self.max_backoff);
        if !self.jitter || base.is_zero() {
            return base;
        }

        // Full jitter over the upper half keeps attempts spread but bounded.
        let half = base / 2;
        let extra = rand::rng().random_range(0..=half.as_millis() as u64);
        half + Duration::from_millis(extra)
    }
}

/// A gateway that re-sends failed requests to an inner gateway.
pub struct RetryingGateway {
    inner: Arc<dyn ModelGateway>,
    policy: RetryPolicy,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        match self.policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(request))
                .await
                .unwrap_or(Err(GatewayError::Timeout(limit))),
            None => self.inner.complete(request).await,
        }
    }
}

#[async_trait]
impl ModelGateway for RetryingGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        let mut attempt = 0u32;

        loop {
            match self.attempt(request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff_for(attempt, e.retry_after());
                    warn!(
                        gateway = %self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Gateway call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 0 {
                        info!(
                            gateway = %self.inner.name(),
                            attempts = attempt + 1,
                            "Giving up on gateway call"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
