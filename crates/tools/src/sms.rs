//! Text-message assistant tools.
//!
//! Every exchange with the user goes through `send_text_to_user`; the model
//! is run under a mandatory tool policy so it never answers in plain text.
//! Sent messages land in an [`Outbox`] the caller drains and delivers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolPayload};
use tracing::info;

/// Messages sent by [`SendTextTool`], oldest first.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<String>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything sent so far.
    pub async fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

pub struct SendTextTool {
    outbox: Outbox,
}

impl SendTextTool {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl Tool for SendTextTool {
    fn name(&self) -> &str {
        "send_text_to_user"
    }

    fn description(&self) -> &str {
        "Sends a text message to a user"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The piece of text to be sent to the user via text message"
                }
            },
            "required": ["text"]
        })
    }

    fn is_idempotent(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;

        info!(chars = text.len(), "Text message sent");
        self.outbox.sent.lock().await.push(text.to_string());
        Ok(ToolPayload::Text("Text message sent.".into()))
    }
}

pub struct CustomerInfoTool;

#[async_trait]
impl Tool for CustomerInfoTool {
    fn name(&self) -> &str {
        "get_customer_info"
    }

    fn description(&self) -> &str {
        "Gets information on a customer based on the customer's username. Response includes email, \
         username, and previous purchases. Only call this tool once a user has provided you with their username"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "username": {
                    "type": "string",
                    "description": "The username of the user in question."
                }
            },
            "required": ["username"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let username = arguments["username"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'username' argument".into()))?;

        Ok(ToolPayload::Json(serde_json::json!({
            "username": username,
            "email": format!("{username}@email.com"),
            "purchases": [
                {"id": 1, "product": "computer mouse"},
                {"id": 2, "product": "screen protector"},
                {"id": 3, "product": "usb charging cable"}
            ]
        })))
    }
}
