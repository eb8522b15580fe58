//! Model Gateway trait: the abstraction over hosted model backends.
//!
//! A gateway takes the whole conversation, a system directive, the declared
//! tool schemas and a tool-selection policy, and returns either final text or
//! a list of tool invocation requests. Gateways are stateless between calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::message::Turn;
use crate::tool::{ToolInvocationRequest, ToolSchema};

/// Constraint on whether and which tool the model must invoke.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum ToolSelectionPolicy {
    /// The model may or may not invoke a tool.
    #[default]
    Automatic,
    /// The model must invoke a tool of its choosing.
    MandatoryAny,
    /// The model must invoke the named tool.
    MandatoryNamed(String),
}

impl ToolSelectionPolicy {
    /// Whether the policy forces a tool call.
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, Self::Automatic)
    }

    /// Check a decoded response against this policy.
    ///
    /// Mandatory policies reject final text. `any` accepts exactly one
    /// request; a named policy rejects requests for any other tool.
    pub fn enforce(&self, response: &GatewayResponse) -> Result<(), GatewayError> {
        match (self, response) {
            (Self::Automatic, _) => Ok(()),
            (_, GatewayResponse::FinalText(_)) => Err(GatewayError::PolicyViolation(format!(
                "policy {self} requires a tool call but the model returned text"
            ))),
            (Self::MandatoryAny, GatewayResponse::ToolRequests { requests, .. }) => {
                match requests.len() {
                    1 => Ok(()),
                    0 => Err(GatewayError::PolicyViolation(
                        "policy any requires a tool call but no request was returned".into(),
                    )),
                    n => Err(GatewayError::PolicyViolation(format!(
                        "policy any allows exactly one tool call but the model made {n}"
                    ))),
                }
            }
            (Self::MandatoryNamed(name), GatewayResponse::ToolRequests { requests, .. }) => {
                if requests.is_empty() {
                    return Err(GatewayError::PolicyViolation(format!(
                        "policy requires tool '{name}' but no request was returned"
                    )));
                }
                match requests.iter().find(|r| r.tool_name != *name) {
                    Some(other) => Err(GatewayError::PolicyViolation(format!(
                        "policy requires tool '{name}' but the model requested '{}'",
                        other.tool_name
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

impl std::fmt::Display for ToolSelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automatic => f.write_str("auto"),
            Self::MandatoryAny => f.write_str("any"),
            Self::MandatoryNamed(name) => write!(f, "tool:{name}"),
        }
    }
}

impl std::str::FromStr for ToolSelectionPolicy {
    type Err = std::convert::Infallible;

    /// `auto`, `any`, or a tool name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" | "automatic" => Self::Automatic,
            "any" => Self::MandatoryAny,
            other => Self::MandatoryNamed(other.strip_prefix("tool:").unwrap_or(other).to_string()),
        })
    }
}

/// Everything a gateway needs for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// The model to use (e.g., "claude-3-5-sonnet-20240620")
    pub model: String,

    /// Free-text system directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The full conversation, oldest turn first
    pub turns: Vec<Turn>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    /// Tool-selection policy for this call
    #[serde(default)]
    pub policy: ToolSelectionPolicy,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (gateway default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// The decoded shape of a model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum GatewayResponse {
    /// The model produced its answer.
    FinalText(String),
    /// The model wants tools executed, in the given order.
    ToolRequests {
        /// Text the model emitted before the requests, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preamble: Option<String>,
        requests: Vec<ToolInvocationRequest>,
    },
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// A complete reply from a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReply {
    /// The decoded response
    pub response: GatewayResponse,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// The core Model Gateway trait.
///
/// Each backend implements this trait. The loop driver calls `complete()`
/// without knowing which backend is in use. Implementations are constructed
/// once and passed in explicitly; no global client state is assumed.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send the conversation and get one decoded model turn back.
    async fn complete(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError>;
}
