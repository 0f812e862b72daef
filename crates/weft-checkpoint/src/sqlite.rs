use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use weft_core::error::{GraphError, Result};

use crate::store::CheckpointStore;
use crate::types::{Checkpoint, CheckpointMetadata, CheckpointSource};

/// SQLite-backed checkpoint store for durable persistence.
///
/// Thread-safe via `Arc<Mutex<Connection>>`. All SQLite work runs on a
/// blocking thread through `tokio::task::spawn_blocking`.
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| GraphError::Checkpoint(format!("failed to open database: {e}")))?;
        Self::with_connection(conn)
    }

    /// An in-memory database, useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GraphError::Checkpoint(format!("failed to open in-memory db: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id TEXT NOT NULL,
                thread_key TEXT NOT NULL,
                parent_id TEXT,
                seq INTEGER NOT NULL,
                state TEXT NOT NULL,
                pending_node TEXT,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (thread_key, id)
            );
            CREATE INDEX IF NOT EXISTS idx_checkpoints_thread
                ON checkpoints(thread_key, seq);",
        )
        .map_err(|e| GraphError::Checkpoint(format!("failed to create table: {e}")))?;
        Ok(())
    }
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    let id: String = row.get(0)?;
    let thread_key: String = row.get(1)?;
    let parent_id: Option<String> = row.get(2)?;
    let seq: i64 = row.get(3)?;
    let state_json: String = row.get(4)?;
    let pending_node: Option<String> = row.get(5)?;
    let metadata_json: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    let state: Value = serde_json::from_str(&state_json).unwrap_or(Value::Null);
    let metadata: CheckpointMetadata =
        serde_json::from_str(&metadata_json).unwrap_or(CheckpointMetadata {
            source: CheckpointSource::Step,
            node: None,
        });
    let created_at: DateTime<Utc> = created_at_str.parse().unwrap_or_else(|_| Utc::now());

    Ok(Checkpoint {
        id,
        thread_key,
        parent_id,
        seq: seq as u64,
        state,
        pending_node,
        metadata,
        created_at,
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let state_json = serde_json::to_string(&checkpoint.state)
                .map_err(|e| GraphError::Checkpoint(format!("serialize state: {e}")))?;
            let metadata_json = serde_json::to_string(&checkpoint.metadata)
                .map_err(|e| GraphError::Checkpoint(format!("serialize metadata: {e}")))?;
            let created_at_str = checkpoint.created_at.to_rfc3339();

            conn.execute(
                "INSERT OR REPLACE INTO checkpoints
                    (id, thread_key, parent_id, seq, state, pending_node, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    checkpoint.id,
                    checkpoint.thread_key,
                    checkpoint.parent_id,
                    checkpoint.seq as i64,
                    state_json,
                    checkpoint.pending_node,
                    metadata_json,
                    created_at_str,
                ],
            )
            .map_err(|e| GraphError::Checkpoint(format!("insert checkpoint: {e}")))?;

            Ok(())
        })
        .await
        .map_err(|e| GraphError::Checkpoint(format!("spawn_blocking: {e}")))?
    }

    async fn get(&self, thread_key: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let conn = Arc::clone(&self.conn);
        let thread_key = thread_key.to_owned();
        let checkpoint_id = checkpoint_id.to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT id, thread_key, parent_id, seq, state, pending_node, metadata, created_at
                     FROM checkpoints
                     WHERE thread_key = ?1 AND id = ?2",
                )
                .map_err(|e| GraphError::Checkpoint(format!("prepare: {e}")))?;

            let result = stmt
                .query_row(params![thread_key, checkpoint_id], row_to_checkpoint)
                .optional()
                .map_err(|e| GraphError::Checkpoint(format!("query: {e}")))?;

            Ok(result)
        })
        .await
        .map_err(|e| GraphError::Checkpoint(format!("spawn_blocking: {e}")))?
    }

    async fn get_latest(&self, thread_key: &str) -> Result<Option<Checkpoint>> {
        let conn = Arc::clone(&self.conn);
        let thread_key = thread_key.to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT id, thread_key, parent_id, seq, state, pending_node, metadata, created_at
                     FROM checkpoints
                     WHERE thread_key = ?1
                     ORDER BY seq DESC
                     LIMIT 1",
                )
                .map_err(|e| GraphError::Checkpoint(format!("prepare: {e}")))?;

            let result = stmt
                .query_row(params![thread_key], row_to_checkpoint)
                .optional()
                .map_err(|e| GraphError::Checkpoint(format!("query: {e}")))?;

            Ok(result)
        })
        .await
        .map_err(|e| GraphError::Checkpoint(format!("spawn_blocking: {e}")))?
    }

    async fn list(&self, thread_key: &str) -> Result<Vec<Checkpoint>> {
        let conn = Arc::clone(&self.conn);
        let thread_key = thread_key.to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT id, thread_key, parent_id, seq, state, pending_node, metadata, created_at
                     FROM checkpoints
                     WHERE thread_key = ?1
                     ORDER BY seq ASC",
                )
                .map_err(|e| GraphError::Checkpoint(format!("prepare: {e}")))?;

            let rows = stmt
                .query_map(params![thread_key], row_to_checkpoint)
                .map_err(|e| GraphError::Checkpoint(format!("query: {e}")))?;

            let mut checkpoints = Vec::new();
            for row in rows {
                checkpoints
                    .push(row.map_err(|e| GraphError::Checkpoint(format!("read row: {e}")))?);
            }

            Ok(checkpoints)
        })
        .await
        .map_err(|e| GraphError::Checkpoint(format!("spawn_blocking: {e}")))?
    }

    async fn clear(&self, thread_key: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let thread_key = thread_key.to_owned();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "DELETE FROM checkpoints WHERE thread_key = ?1",
                params![thread_key],
            )
            .map_err(|e| GraphError::Checkpoint(format!("delete: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| GraphError::Checkpoint(format!("spawn_blocking: {e}")))?
    }
}
