use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata describing a tool, in the shape model providers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

/// A tool the agent can run: given JSON arguments, produce a string result
/// or an error. Reached only from within node functions.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn execute(&self, arguments: serde_json::Value) -> Result<String>;
}
