use async_trait::async_trait;

use weft_core::error::Result;

use crate::types::Checkpoint;

/// Async storage backend for execution checkpoints, keyed by thread.
///
/// Implementations must be thread-safe (`Send + Sync`). The scheduler
/// depends only on this interface; backends range from an in-memory map
/// to durable stores.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint. A put with an existing id replaces that entry;
    /// otherwise the checkpoint is appended to the thread's history.
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Retrieve a specific checkpoint by thread key and checkpoint id.
    async fn get(&self, thread_key: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// The latest (highest-seq) checkpoint for a thread.
    async fn get_latest(&self, thread_key: &str) -> Result<Option<Checkpoint>>;

    /// Full checkpoint history for a thread, ordered by seq ascending.
    async fn list(&self, thread_key: &str) -> Result<Vec<Checkpoint>>;

    /// Remove all checkpoints for a thread.
    async fn clear(&self, thread_key: &str) -> Result<()>;
}
