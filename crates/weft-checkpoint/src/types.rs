use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Why a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// A node requested suspension; `pending_node` is set and `resume`
    /// may be called against this checkpoint.
    Interrupt,
    /// Routine per-step snapshot (crash-recovery policy).
    Step,
    /// Execution reached the terminal node; `pending_node` is `None`.
    Complete,
    /// Execution failed; the snapshot holds the last pre-failure state.
    Failure,
}

/// Metadata describing how a checkpoint was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// The node the scheduler was at when the checkpoint was taken.
    pub node: Option<String>,
}

/// A durable snapshot of one thread's execution.
///
/// Checkpoints are append-only per thread: each new checkpoint supersedes
/// the previous visible one, and the `parent_id` chain preserves history
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier for this checkpoint.
    pub id: String,
    /// Thread key scoping this execution's state and history.
    pub thread_key: String,
    /// Previous checkpoint for the same thread, if any.
    pub parent_id: Option<String>,
    /// Monotonic per-thread sequence number.
    pub seq: u64,
    /// Full state snapshot at the time of the checkpoint.
    pub state: Value,
    /// Node awaiting execution. `Some` while suspended or mid-run,
    /// `None` once the thread has completed.
    pub pending_node: Option<String>,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Build a checkpoint with a fresh id and the current timestamp.
    pub fn new(
        thread_key: impl Into<String>,
        parent_id: Option<String>,
        seq: u64,
        state: Value,
        pending_node: Option<String>,
        source: CheckpointSource,
        node: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_key: thread_key.into(),
            parent_id,
            seq,
            state,
            pending_node,
            metadata: CheckpointMetadata { source, node },
            created_at: Utc::now(),
        }
    }

    /// Whether `resume` may be called against this checkpoint.
    pub fn is_suspended(&self) -> bool {
        self.metadata.source == CheckpointSource::Interrupt && self.pending_node.is_some()
    }
}
