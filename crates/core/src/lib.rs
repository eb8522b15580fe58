//! # Toolwright Core
//!
//! Domain types, traits, and error definitions for the Toolwright tool-use
//! runtime. Every other crate builds on the model defined here.
//!
//! ## Design Philosophy
//!
//! The three collaborators of a tool-use conversation are defined here:
//! - the Conversation store ([`Conversation`]), an append-only log of turns
//! - the Model Gateway ([`ModelGateway`]), a stateless remote capability
//! - the Tool Dispatcher ([`ToolRegistry`]), which validates and runs tools
//!
//! Implementations of the gateway live in `toolwright-providers`; the loop
//! that ties them together lives in `toolwright-agent`.

pub mod agent;
pub mod error;
pub mod event;
pub mod gateway;
pub mod message;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::LoopState;
pub use error::{ConversationError, GatewayError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use gateway::{
    GatewayReply, GatewayRequest, GatewayResponse, ModelGateway, ToolSelectionPolicy, Usage,
};
pub use message::{ContentBlock, Conversation, ConversationId, Role, Turn, TurnContent};
pub use tool::{Tool, ToolInvocationRequest, ToolPayload, ToolRegistry, ToolResult, ToolSchema};
