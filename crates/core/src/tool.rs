//! Tool trait and the Tool Dispatcher.
//!
//! Tools are local handlers the model may ask to have executed on its behalf.
//! The registry holds every declared tool for the lifetime of the process and
//! is read-only once the loop starts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::schema;

/// Declaration of a callable capability, as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name within a session
    pub name: String,

    /// Natural-language description (consumed by the model, not validated)
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub input_schema: serde_json::Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A request from the model to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Opaque correlation token, unique per request
    pub id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Text(String),
    Json(serde_json::Value),
}

impl ToolPayload {
    /// Render the payload as the string content of a tool-result block.
    pub fn to_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for ToolPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_content())
    }
}

/// The outcome of a dispatched tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The request id this result answers
    pub correlating_id: String,

    /// The output content
    pub payload: ToolPayload,

    /// Whether the payload describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(correlating_id: impl Into<String>, payload: ToolPayload) -> Self {
        Self {
            correlating_id: correlating_id.into(),
            payload,
            is_error: false,
        }
    }

    pub fn error(correlating_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            correlating_id: correlating_id.into(),
            payload: ToolPayload::Text(message.into()),
            is_error: true,
        }
    }
}

/// The core Tool trait.
///
/// Handlers receive arguments that have already been validated against
/// [`Tool::input_schema`]. A returned `Err` is a business-level failure and
/// is reported back to the model, not to the caller.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_user").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Whether running this handler twice with the same arguments is harmless.
    ///
    /// Non-idempotent handlers are never subject to dispatch timeouts.
    fn is_idempotent(&self) -> bool {
        true
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError>;

    /// Convert this tool into a ToolSchema for sending to the model.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

struct RegisteredTool {
    handler: Box<dyn Tool>,
    schema: ToolSchema,
    validator: jsonschema::Validator,
}

/// The Tool Dispatcher: a registry of declared tools and their handlers.
///
/// The agent loop uses this to:
/// 1. Get tool schemas to send to the model
/// 2. Validate and execute tool requests
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool, checking its schema.
    ///
    /// Fails on a malformed schema or a name that is already taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let schema = tool.to_schema();
        if self.index.contains_key(&schema.name) {
            return Err(ToolError::DuplicateTool(schema.name));
        }
        let validator = schema::compile(&schema)?;
        debug!(tool = %schema.name, "Registered tool");
        self.index.insert(schema.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            handler: tool,
            schema,
            validator,
        });
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.entry(name).map(|t| t.handler.as_ref())
    }

    /// Get a tool's declared schema by name.
    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.entry(name).map(|t| &t.schema)
    }

    /// All tool schemas in registration order (for sending to the model).
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema.clone()).collect()
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.schema.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments against a tool's schema without executing it.
    pub fn validate_arguments(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
    ) -> Result<(), ToolError> {
        let entry = self
            .entry(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        let problems = schema::violations(&entry.validator, arguments);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments(format!(
                "arguments for '{tool_name}' do not match its schema: {}",
                problems.join("; ")
            )))
        }
    }

    /// Dispatch a tool request with no time limit.
    pub async fn dispatch(&self, request: &ToolInvocationRequest) -> Result<ToolResult, ToolError> {
        self.dispatch_with_timeout(request, None).await
    }

    /// Validate and execute a tool request.
    ///
    /// Only an unknown tool name is returned as `Err`. Invalid arguments,
    /// handler failures, and timeouts become `ToolResult { is_error: true }`
    /// so the model can see them and adapt. The timeout is applied only to
    /// idempotent handlers.
    pub async fn dispatch_with_timeout(
        &self,
        request: &ToolInvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<ToolResult, ToolError> {
        let entry = self
            .entry(&request.tool_name)
            .ok_or_else(|| ToolError::UnknownTool(request.tool_name.clone()))?;

        if let Err(e) = self.validate_arguments(&request.tool_name, &request.arguments) {
            debug!(tool = %request.tool_name, error = %e, "Rejected tool arguments");
            return Ok(ToolResult::error(&request.id, format!("Error: {e}")));
        }

        let handler = entry.handler.as_ref();
        let execution = handler.execute(request.arguments.clone());
        let outcome = match timeout {
            Some(limit) if handler.is_idempotent() => {
                match tokio::time::timeout(limit, execution).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: request.tool_name.clone(),
                        timeout: limit,
                    }),
                }
            }
            _ => execution.await,
        };

        Ok(match outcome {
            Ok(payload) => ToolResult::success(&request.id, payload),
            Err(e) => {
                warn!(tool = %request.tool_name, error = %e, "Tool execution failed");
                ToolResult::error(&request.id, format!("Error: {e}"))
            }
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
