//! Loop driver errors.
//!
//! Everything here is fatal for the current user turn. Recoverable problems
//! (bad arguments, handler failures) never reach this type; they are fed back
//! to the model as error tool results.

use thiserror::Error;
use toolwright_core::error::{ConversationError, GatewayError};

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Model requested unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Tool loop exceeded {max_iterations} model calls without a final answer")]
    ToolLoopExceeded { max_iterations: u32 },

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Gateway protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Conversation rejected turn: {0}")]
    Conversation(ConversationError),
}

impl From<ConversationError> for LoopError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::DuplicateRequestId(id) => Self::ProtocolViolation(format!(
                "tool request id '{id}' collides with an earlier request"
            )),
            other => Self::Conversation(other),
        }
    }
}

impl LoopError {
    /// Whether the user can simply try again (as opposed to an orchestration defect).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::Cancelled => true,
            _ => false,
        }
    }
}
