//! # TaskHelm Core
//!
//! Domain types, traits, and error definitions for the TaskHelm console
//! copilot. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod display;
pub mod error;
pub mod hook;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use display::{DisplaySink, NullSink};
pub use error::{Error, Result};
pub use hook::{Dispatcher, InvocationHook};
pub use message::{Conversation, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
