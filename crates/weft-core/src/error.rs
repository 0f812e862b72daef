use thiserror::Error;

/// Top-level error type for the Weft library.
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while building or executing a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid graph: {0}")]
    Validation(String),

    #[error("Router on '{node}' returned undeclared route key '{key}'")]
    Routing { node: String, key: String },

    #[error("Node error in '{node}': {source}")]
    NodeExecution {
        node: String,
        source: Box<WeftError>,
    },

    #[error("Reducer error: {0}")]
    Reducer(String),

    #[error("No suspended execution for thread '{0}'")]
    NoPendingExecution(String),

    #[error("Thread '{0}' already has an execution in flight")]
    ConcurrentExecution(String),

    #[error("Step limit ({limit}) exceeded")]
    StepLimit { limit: usize },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

/// Errors from a model client implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from a tool executor implementation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, WeftError>;
