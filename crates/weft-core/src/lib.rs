pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod tool;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{CallOptions, ModelClient, ModelReply};
    pub use crate::config::RunConfig;
    pub use crate::error::{GraphError, Result, WeftError};
    pub use crate::message::{Message, ToolCall};
    pub use crate::tool::{ToolExecutor, ToolSpec};
}
