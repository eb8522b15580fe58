//! Error types for the Toolwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a [`crate::gateway::ModelGateway`].
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Rate limited by gateway{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Gateway overloaded (status: {status_code})")]
    Overloaded { status_code: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid tool schema: {0}")]
    InvalidSchema(String),

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("Tool selection policy violated: {0}")]
    PolicyViolation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}s", d.as_secs()),
        None => String::new(),
    }
}

impl GatewayError {
    /// Transport-level failures that may succeed when the same request is
    /// sent again. Everything else is fatal for the current turn.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Overloaded { .. } | Self::Network(_) | Self::Timeout(_)
        )
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Invalid schema for tool '{tool_name}': {reason}")]
    InvalidSchema { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout:?}")]
    Timeout { tool_name: String, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Invalid turn: {0}")]
    InvalidTurn(String),

    #[error("Tool request id '{0}' was already issued in this conversation")]
    DuplicateRequestId(String),
}
