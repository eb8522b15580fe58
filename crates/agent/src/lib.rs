//! The tool-use conversation loop.
//!
//! The loop follows a **Think → Act → Observe** cycle:
//!
//! 1. **Append** the user message to the conversation
//! 2. **Call the model** with the full history and the declared tools
//! 3. **If tool requests**: dispatch them, append results in request order, go to 2
//! 4. **If final text**: post-process it and hand it back to the caller
//!
//! The cycle is bounded by an iteration cap, a timeout per gateway call, a
//! separate timeout per tool dispatch, and an optional cancellation token.

pub mod error;
pub mod loop_runner;
pub mod reply;

pub use error::LoopError;
pub use loop_runner::{Extraction, LoopSettings, ToolLoop, TurnOutcome};
pub use reply::{PassThrough, ReplyExtractor, TagReplyExtractor};
