//! Model gateway implementations for Toolwright.
//!
//! All gateways implement the `toolwright_core::ModelGateway` trait.
//! [`build_from_config`] assembles the configured gateway stack.

pub mod anthropic;
pub mod retry;

pub use anthropic::AnthropicGateway;
pub use retry::{RetryPolicy, RetryingGateway};

use std::sync::Arc;
use std::time::Duration;

use toolwright_config::{AppConfig, RetryConfig};
use toolwright_core::{GatewayError, ModelGateway};

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: (config.attempt_timeout_secs > 0)
                .then(|| Duration::from_secs(config.attempt_timeout_secs)),
            jitter: true,
        }
    }
}

/// Build the gateway described by configuration: the Anthropic adapter
/// wrapped in the retry layer.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        GatewayError::NotConfigured(
            "no API key; set TOOLWRIGHT_API_KEY or ANTHROPIC_API_KEY, or add api_key to config.toml"
                .into(),
        )
    })?;

    let mut anthropic = AnthropicGateway::new(api_key)?;
    if let Some(ref url) = config.base_url {
        anthropic = anthropic.with_base_url(url);
    }

    Ok(Arc::new(RetryingGateway::new(
        Arc::new(anthropic),
        RetryPolicy::from(&config.retry),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = AppConfig::default();
        match build_from_config(&config) {
            Err(GatewayError::NotConfigured(msg)) => assert!(msg.contains("API key")),
            Err(other) => panic!("Expected NotConfigured, got: {other:?}"),
            Ok(_) => panic!("Expected an error without an API key"),
        }
    }

    #[test]
    fn builds_with_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-test".into()),
            base_url: Some("http://localhost:8080".into()),
            ..AppConfig::default()
        };
        let gateway = build_from_config(&config).unwrap();
        assert_eq!(gateway.name(), "anthropic");
    }

    #[test]
    fn retry_policy_from_config() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            attempt_timeout_secs: 0,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_backoff, Duration::from_secs(4));
        assert!(policy.attempt_timeout.is_none());
    }
}
