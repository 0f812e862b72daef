use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use weft_core::error::Result;

use crate::store::CheckpointStore;
use crate::types::Checkpoint;

/// In-memory checkpoint store for tests and short-lived runs.
///
/// Thread-safe via `RwLock`. All data is lost when the store is dropped.
pub struct MemoryCheckpointStore {
    /// thread_key -> history ordered by seq
    data: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut data = self.data.write().unwrap();
        let history = data.entry(checkpoint.thread_key.clone()).or_default();

        if let Some(pos) = history.iter().position(|cp| cp.id == checkpoint.id) {
            history[pos] = checkpoint;
        } else {
            history.push(checkpoint);
        }

        history.sort_by_key(|cp| cp.seq);
        Ok(())
    }

    async fn get(&self, thread_key: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let data = self.data.read().unwrap();
        Ok(data
            .get(thread_key)
            .and_then(|history| history.iter().find(|cp| cp.id == checkpoint_id).cloned()))
    }

    async fn get_latest(&self, thread_key: &str) -> Result<Option<Checkpoint>> {
        let data = self.data.read().unwrap();
        Ok(data
            .get(thread_key)
            .and_then(|history| history.last().cloned()))
    }

    async fn list(&self, thread_key: &str) -> Result<Vec<Checkpoint>> {
        let data = self.data.read().unwrap();
        Ok(data.get(thread_key).cloned().unwrap_or_default())
    }

    async fn clear(&self, thread_key: &str) -> Result<()> {
        let mut data = self.data.write().unwrap();
        data.remove(thread_key);
        Ok(())
    }
}
