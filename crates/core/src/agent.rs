//! Loop driver state types.

use serde::{Deserialize, Serialize};

/// Where a conversation is in the tool-use cycle.
///
/// `AwaitingUserInput → ModelThinking → (ExecutingTools → ModelThinking)* → AwaitingUserInput`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Idle; the last turn was answered or nothing has been asked yet
    #[default]
    AwaitingUserInput,
    /// A gateway call is in flight
    ModelThinking,
    /// Tool requests from the last model turn are being dispatched
    ExecutingTools,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::ModelThinking => "model_thinking",
            Self::ExecutingTools => "executing_tools",
        };
        f.write_str(label)
    }
}
