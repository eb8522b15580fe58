//! Turns and the Conversation store.
//!
//! A conversation is an append-only log of turns. The full log is resent to
//! the gateway on every call, so the store is the only place conversational
//! state lives.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversationError;
use crate::tool::{ToolInvocationRequest, ToolResult};

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Output of a locally executed tool
    ToolResult,
}

/// A structured piece of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(ToolInvocationRequest),
    ToolResult(ToolResult),
}

/// Turn content: plain text or one-or-more structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One entry in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// Text or structured blocks
    pub content: TurnContent,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn with_content(role: Role, content: TurnContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_content(Role::User, TurnContent::Text(text.into()))
    }

    /// Create a plain-text assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_content(Role::Assistant, TurnContent::Text(text.into()))
    }

    /// Create an assistant turn carrying tool invocation requests, optionally
    /// preceded by the text the model produced before deciding to call tools.
    pub fn tool_requests(preamble: Option<String>, requests: Vec<ToolInvocationRequest>) -> Self {
        let mut blocks = Vec::with_capacity(requests.len() + 1);
        if let Some(text) = preamble.filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::Text { text });
        }
        blocks.extend(requests.into_iter().map(ContentBlock::ToolUse));
        Self::with_content(Role::Assistant, TurnContent::Blocks(blocks))
    }

    /// Create a tool-result turn.
    pub fn tool_result(result: ToolResult) -> Self {
        Self::with_content(
            Role::ToolResult,
            TurnContent::Blocks(vec![ContentBlock::ToolResult(result)]),
        )
    }

    /// All text in this turn, blocks joined by newlines.
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            TurnContent::Text(_) => &[],
            TurnContent::Blocks(blocks) => blocks,
        }
    }

    /// Tool invocation requests carried by this turn, in request order.
    pub fn tool_requests_iter(&self) -> impl Iterator<Item = &ToolInvocationRequest> {
        self.blocks().iter().filter_map(|b| match b {
            ContentBlock::ToolUse(req) => Some(req),
            _ => None,
        })
    }

    /// The tool result carried by this turn, if any.
    pub fn tool_result_block(&self) -> Option<&ToolResult> {
        self.blocks().iter().find_map(|b| match b {
            ContentBlock::ToolResult(res) => Some(res),
            _ => None,
        })
    }
}

/// The Conversation store: an ordered, append-only log of turns.
///
/// Tracks which tool requests are still awaiting a result so that an
/// orphaned tool result can never enter the log.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: ConversationId,
    turns: Vec<Turn>,
    issued: HashSet<String>,
    outstanding: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            issued: HashSet::new(),
            outstanding: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a conversation from a persisted snapshot, re-checking every turn.
    pub fn from_turns(
        id: ConversationId,
        turns: impl IntoIterator<Item = Turn>,
    ) -> Result<Self, ConversationError> {
        let mut conv = Self {
            id,
            ..Self::new()
        };
        for turn in turns {
            conv.append(turn)?;
        }
        Ok(conv)
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a turn to the end of the log.
    ///
    /// Rejects tool results that do not answer an outstanding request and
    /// tool requests whose id was already issued in this conversation.
    /// The log is left untouched when an error is returned.
    pub fn append(&mut self, turn: Turn) -> Result<(), ConversationError> {
        match turn.role {
            Role::User => {
                if !turn.blocks().iter().all(|b| matches!(b, ContentBlock::Text { .. })) {
                    return Err(ConversationError::InvalidTurn(
                        "user turns may only carry text".into(),
                    ));
                }
            }
            Role::Assistant => {
                if turn
                    .blocks()
                    .iter()
                    .any(|b| matches!(b, ContentBlock::ToolResult(_)))
                {
                    return Err(ConversationError::InvalidTurn(
                        "assistant turns cannot carry tool results".into(),
                    ));
                }
                let mut seen = HashSet::new();
                for req in turn.tool_requests_iter() {
                    if self.issued.contains(&req.id) || !seen.insert(req.id.as_str()) {
                        return Err(ConversationError::DuplicateRequestId(req.id.clone()));
                    }
                }
                for req in turn.tool_requests_iter() {
                    self.issued.insert(req.id.clone());
                    self.outstanding.push(req.id.clone());
                }
            }
            Role::ToolResult => {
                let [ContentBlock::ToolResult(result)] = turn.blocks() else {
                    return Err(ConversationError::InvalidTurn(
                        "tool_result turns must carry exactly one tool result".into(),
                    ));
                };
                let Some(pos) = self
                    .outstanding
                    .iter()
                    .position(|id| *id == result.correlating_id)
                else {
                    return Err(ConversationError::InvalidTurn(format!(
                        "no outstanding tool request with id '{}'",
                        result.correlating_id
                    )));
                };
                self.outstanding.remove(pos);
            }
        }

        self.updated_at = Utc::now();
        self.turns.push(turn);
        Ok(())
    }

    /// The ordered turns to send as request context.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Request ids still waiting for a tool result, in issue order.
    pub fn outstanding_requests(&self) -> &[String] {
        &self.outstanding
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
