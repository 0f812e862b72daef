use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, ToolCall};
use crate::tool::ToolSpec;

/// Options for a single model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Tools the model may request; empty means plain text generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

/// What the model produced: generated text plus any structured tool-call
/// requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }
}

/// A language-model client, invoked from node bodies with a list of
/// role-tagged messages. Opaque to the graph scheduler.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, messages: &[Message], options: &CallOptions) -> Result<ModelReply>;

    /// Model name or identifier, for logging.
    fn name(&self) -> &str;
}
