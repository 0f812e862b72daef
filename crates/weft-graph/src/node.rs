use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use weft_core::config::RunConfig;
use weft_core::error::Result;

/// What a step function hands back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// A partial state update, merged field by field through the schema.
    Update(Value),
    /// Pause the run before this node does any work. The payload is shown
    /// to whoever resumes the thread.
    Suspend(Value),
}

impl StepOutput {
    /// Shorthand for an update built from any serializable value.
    pub fn update(value: impl serde::Serialize) -> Result<Self> {
        Ok(StepOutput::Update(serde_json::to_value(value)?))
    }

    pub fn suspend(prompt: impl Into<Value>) -> Self {
        StepOutput::Suspend(prompt.into())
    }
}

type BoxedStepFuture = Pin<Box<dyn Future<Output = Result<StepOutput>> + Send>>;

/// A named unit of work. Receives a read-only snapshot of the merged state
/// and the run config, returns a `StepOutput`.
#[derive(Clone)]
pub struct Node {
    name: String,
    func: Arc<dyn Fn(Value, RunConfig) -> BoxedStepFuture + Send + Sync>,
}

impl Node {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, RunConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |state, config| Box::pin(func(state, config))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn invoke(&self, state: Value, config: RunConfig) -> Result<StepOutput> {
        (self.func)(state, config).await
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node").field("name", &self.name).finish()
    }
}
