//! Anthropic Messages API gateway.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System directive as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - `tool_choice` derived from the tool-selection policy
//! - Responses decoded once, on `stop_reason`, into a [`GatewayResponse`]

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolwright_core::error::GatewayError;
use toolwright_core::gateway::*;
use toolwright_core::message::{self, Role, Turn, TurnContent};
use toolwright_core::tool::{ToolInvocationRequest, ToolSchema};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API gateway.
pub struct AnthropicGateway {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicGateway {
    /// Create a new Anthropic gateway.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| GatewayError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert turns to Anthropic API messages.
    ///
    /// Tool results travel as `user` messages; consecutive results are merged
    /// into one message so every request of a model turn is answered together.
    /// Assistant turns with no text are skipped since the API rejects empty
    /// content.
    fn to_api_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for turn in turns {
            match turn.role {
                Role::User => result.push(AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Text(turn.text()),
                }),
                Role::Assistant => {
                    let content = match &turn.content {
                        TurnContent::Text(text) if text.trim().is_empty() => continue,
                        TurnContent::Text(text) => AnthropicContent::Text(text.clone()),
                        TurnContent::Blocks(blocks) => AnthropicContent::Blocks(
                            blocks.iter().filter_map(Self::to_api_block).collect(),
                        ),
                    };
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content,
                    });
                }
                Role::ToolResult => {
                    let Some(res) = turn.tool_result_block() else {
                        continue;
                    };
                    let block = ContentBlock::ToolResult {
                        tool_use_id: res.correlating_id.clone(),
                        content: res.payload.to_content(),
                        is_error: res.is_error,
                    };
                    match result.last_mut() {
                        Some(AnthropicMessage {
                            role,
                            content: AnthropicContent::Blocks(blocks),
                        }) if role == "user"
                            && blocks
                                .iter()
                                .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                        {
                            blocks.push(block);
                        }
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        }),
                    }
                }
            }
        }

        result
    }

    fn to_api_block(block: &message::ContentBlock) -> Option<ContentBlock> {
        match block {
            message::ContentBlock::Text { text } if text.trim().is_empty() => None,
            message::ContentBlock::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
            message::ContentBlock::ToolUse(req) => Some(ContentBlock::ToolUse {
                id: req.id.clone(),
                name: req.tool_name.clone(),
                input: req.arguments.clone(),
            }),
            message::ContentBlock::ToolResult(_) => None,
        }
    }

    /// Convert tool schemas to Anthropic format.
    fn to_api_tools(tools: &[ToolSchema]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    fn to_tool_choice(policy: &ToolSelectionPolicy) -> serde_json::Value {
        match policy {
            ToolSelectionPolicy::Automatic => serde_json::json!({"type": "auto"}),
            ToolSelectionPolicy::MandatoryAny => {
                serde_json::json!({"type": "any", "disable_parallel_tool_use": true})
            }
            ToolSelectionPolicy::MandatoryNamed(name) => {
                serde_json::json!({"type": "tool", "name": name})
            }
        }
    }

    fn build_body(request: &GatewayRequest) -> Result<serde_json::Value, GatewayError> {
        if request.tools.is_empty() && request.policy.is_mandatory() {
            return Err(GatewayError::InvalidSchema(format!(
                "policy {} requires at least one declared tool",
                request.policy
            )));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "max_tokens": request.max_tokens,
        });

        if let Some(ref sys) = request.system {
            body["system"] = serde_json::json!(sys);
        }

        if let Some(t) = request.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = Self::to_tool_choice(&request.policy);
        }

        Ok(body)
    }

    /// Map a non-success HTTP status to a gateway error.
    fn classify_failure(status: u16, retry_after: Option<Duration>, body: &str) -> GatewayError {
        let message = serde_json::from_str::<AnthropicErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            429 => GatewayError::RateLimited { retry_after },
            401 | 403 => GatewayError::AuthenticationFailed(message),
            400 if message.contains("tools") || message.contains("input_schema") => {
                GatewayError::InvalidSchema(message)
            }
            500..=599 => GatewayError::Overloaded {
                status_code: status,
            },
            _ => GatewayError::Api {
                status_code: status,
                message,
            },
        }
    }

    /// Decode an Anthropic response into a tagged [`GatewayResponse`].
    fn decode(resp: AnthropicResponse) -> Result<GatewayReply, GatewayError> {
        let mut text_parts: Vec<String> = Vec::new();
        let mut requests = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => text_parts.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    if !input.is_object() {
                        return Err(GatewayError::MalformedResponse(format!(
                            "tool_use block '{id}' for '{name}' has non-object input"
                        )));
                    }
                    requests.push(ToolInvocationRequest {
                        id,
                        tool_name: name,
                        arguments: input,
                    });
                }
                ResponseContentBlock::Other => {}
            }
        }

        let text = text_parts.join("\n");
        let response = match resp.stop_reason.as_deref() {
            Some("tool_use") => {
                if requests.is_empty() {
                    return Err(GatewayError::MalformedResponse(
                        "stop_reason is tool_use but no tool_use block was returned".into(),
                    ));
                }
                GatewayResponse::ToolRequests {
                    preamble: Some(text).filter(|t| !t.is_empty()),
                    requests,
                }
            }
            _ if !requests.is_empty() => {
                return Err(GatewayError::MalformedResponse(format!(
                    "tool_use block returned with stop_reason {:?}",
                    resp.stop_reason
                )));
            }
            _ => GatewayResponse::FinalText(text),
        };

        Ok(GatewayReply {
            response,
            usage: Some(Usage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            }),
            model: resp.model,
        })
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request)?;

        debug!(
            gateway = "anthropic",
            model = %request.model,
            turns = request.turns.len(),
            policy = %request.policy,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(Self::classify_failure(status, retry_after, &error_body));
        }

        let api_resp: AnthropicResponse = response.json().await.map_err(|e| {
            GatewayError::MalformedResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        Self::decode(api_resp)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
