//! scout-core: Core types and traits for scout
//!
//! This crate provides the transcript model, the ReAct grammar, tool
//! contracts, and the agent loop shared by the scout crates.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod react;
pub mod retry;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{AgentConfig, ReactAgent};
pub use error::Error;
pub use message::{Role, Transcript, Turn};
pub use provider::{CallRequest, LanguageModel};
pub use react::{ActionBlock, AgentReply, GrammarState, ReactTurn};
pub use retry::RetryPolicy;
pub use tool::{
    empty_object_schema, FunctionDeclaration, PropertySchema, Tool, ToolDefinition, ToolOutput,
    ToolParameters, ToolRegistry, ToolSpec,
};

pub type Result<T> = std::result::Result<T, Error>;
