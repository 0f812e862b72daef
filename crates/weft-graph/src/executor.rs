use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use weft_checkpoint::store::CheckpointStore;
use weft_checkpoint::types::{Checkpoint, CheckpointSource};
use weft_core::config::RunConfig;
use weft_core::error::{GraphError, Result, WeftError};

use crate::constants::TERMINAL;
use crate::graph::Graph;
use crate::node::StepOutput;

/// Where a thread currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A run is executing steps right now.
    Running,
    /// Paused at a node that asked for outside input.
    Suspended,
    /// Reached the terminal node.
    Done,
    /// A node or router failed; the pre-failure state is checkpointed.
    Failed,
    /// No execution has happened on this thread.
    Idle,
}

/// What `run` or `resume` hands back once the thread stops moving.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: RunStatus,
    /// The merged state at the moment the run stopped.
    pub state: Value,
    /// The node waiting to execute, when suspended or failed mid-graph.
    pub pending_node: Option<String>,
    /// The payload a suspending node surfaced for whoever resumes.
    pub prompt: Option<Value>,
}

/// Status plus enough context to decide what to do with a thread.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: RunStatus,
    pub pending_node: Option<String>,
}

/// Drives a [`Graph`] step by step against a checkpoint store.
///
/// One executor serves many threads. Each thread key is single-writer:
/// a second `run` or `resume` on a thread that already has one in
/// flight fails fast instead of interleaving.
pub struct Executor {
    graph: Arc<Graph>,
    store: Arc<dyn CheckpointStore>,
    statuses: RwLock<HashMap<String, RunStatus>>,
    // Held only for insert/remove, never across an await.
    in_flight: Mutex<HashSet<String>>,
}

/// Releases the thread's in-flight slot when a run ends, on every path.
struct FlightGuard<'a> {
    executor: &'a Executor,
    thread_key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.executor.in_flight.lock() {
            in_flight.remove(&self.thread_key);
        }
    }
}

impl Executor {
    pub fn new(graph: Graph, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            statuses: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Start or re-enter a run on `thread_key`.
    ///
    /// On a fresh thread, `initial` is merged into an empty state through
    /// the schema and execution starts at the entry node. On a thread
    /// suspended at a node, the checkpointed state is restored, `initial`
    /// is merged on top, and the pending node runs again from scratch.
    pub async fn run(
        &self,
        thread_key: &str,
        initial: Value,
        config: RunConfig,
    ) -> Result<ExecutionResult> {
        let _guard = self.acquire(thread_key)?;

        let latest = self.store.get_latest(thread_key).await?;
        let (parent_id, seq) = match &latest {
            Some(cp) => (Some(cp.id.clone()), cp.seq + 1),
            None => (None, 0),
        };
        let (mut state, start_node) = match latest.and_then(|cp| {
            cp.pending_node.clone().map(|node| (cp.state, node))
        }) {
            Some((snapshot, node)) => {
                info!(thread = %thread_key, node = %node, "re-entering interrupted thread");
                let mut state = snapshot;
                self.graph.schema().apply(&mut state, &initial)?;
                (state, node)
            }
            None => {
                let mut state = Value::Object(serde_json::Map::new());
                self.graph.schema().apply(&mut state, &initial)?;
                (state, self.graph.entry().to_string())
            }
        };

        self.set_status(thread_key, RunStatus::Running).await;
        self.step_loop(thread_key, &mut state, start_node, parent_id, seq, &config)
            .await
    }

    /// Resume a suspended thread without re-invoking the paused node.
    ///
    /// `update` stands in for the return value the node never produced:
    /// it is merged through the schema, then routing continues from the
    /// pending node's outgoing edge.
    pub async fn resume(
        &self,
        thread_key: &str,
        update: Value,
        config: RunConfig,
    ) -> Result<ExecutionResult> {
        let _guard = self.acquire(thread_key)?;

        let latest = self.store.get_latest(thread_key).await?;
        let checkpoint = match latest {
            Some(cp) if cp.is_suspended() => cp,
            _ => {
                return Err(GraphError::NoPendingExecution(thread_key.to_string()).into());
            }
        };
        let pending = checkpoint
            .pending_node
            .clone()
            .ok_or_else(|| GraphError::Checkpoint("pending node vanished".into()))?;
        info!(thread = %thread_key, node = %pending, "resuming");

        let mut state = checkpoint.state.clone();
        self.graph.schema().apply(&mut state, &update)?;

        let parent_id = Some(checkpoint.id.clone());
        let seq = checkpoint.seq + 1;
        self.set_status(thread_key, RunStatus::Running).await;

        // The pending node's edge decides where to go; the node itself
        // already had its say when it suspended.
        let next = match self.graph.edge(&pending)?.next(&pending, &state) {
            Ok(next) => next,
            Err(err) => {
                return self
                    .fail(thread_key, &state, &pending, parent_id, seq, err)
                    .await;
            }
        };
        if next == TERMINAL {
            return self.complete(thread_key, &state, parent_id, seq).await;
        }
        self.step_loop(thread_key, &mut state, next, parent_id, seq, &config)
            .await
    }

    /// Current status of a thread. Falls back to the latest checkpoint
    /// when this process has no in-memory record, so status survives a
    /// restart as long as the store does.
    pub async fn status(&self, thread_key: &str) -> Result<StatusReport> {
        if let Some(status) = self.statuses.read().await.get(thread_key).copied() {
            let pending_node = match status {
                RunStatus::Suspended | RunStatus::Failed => self
                    .store
                    .get_latest(thread_key)
                    .await?
                    .and_then(|cp| cp.pending_node),
                _ => None,
            };
            return Ok(StatusReport {
                status,
                pending_node,
            });
        }

        let report = match self.store.get_latest(thread_key).await? {
            None => StatusReport {
                status: RunStatus::Idle,
                pending_node: None,
            },
            Some(cp) => {
                let status = match cp.metadata.source {
                    CheckpointSource::Interrupt => RunStatus::Suspended,
                    CheckpointSource::Failure => RunStatus::Failed,
                    CheckpointSource::Complete => RunStatus::Done,
                    CheckpointSource::Step => RunStatus::Running,
                };
                StatusReport {
                    status,
                    pending_node: cp.pending_node,
                }
            }
        };
        Ok(report)
    }

    /// Full checkpoint history for a thread, oldest first.
    pub async fn history(&self, thread_key: &str) -> Result<Vec<Checkpoint>> {
        self.store.list(thread_key).await
    }

    /// Latest merged state for a thread, if any run has touched it.
    pub async fn state(&self, thread_key: &str) -> Result<Option<Value>> {
        Ok(self.store.get_latest(thread_key).await?.map(|cp| cp.state))
    }

    fn acquire<'a>(&'a self, thread_key: &str) -> Result<FlightGuard<'a>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| WeftError::Other("in-flight registry poisoned".into()))?;
        if !in_flight.insert(thread_key.to_string()) {
            return Err(GraphError::ConcurrentExecution(thread_key.to_string()).into());
        }
        Ok(FlightGuard {
            executor: self,
            thread_key: thread_key.to_string(),
        })
    }

    async fn set_status(&self, thread_key: &str, status: RunStatus) {
        self.statuses
            .write()
            .await
            .insert(thread_key.to_string(), status);
    }

    /// The scheduler: invoke, merge, route, checkpoint, repeat.
    async fn step_loop(
        &self,
        thread_key: &str,
        state: &mut Value,
        start: String,
        mut parent_id: Option<String>,
        mut seq: u64,
        config: &RunConfig,
    ) -> Result<ExecutionResult> {
        let mut current = start;
        let mut steps: usize = 0;

        loop {
            if let Some(limit) = config.max_steps {
                if steps >= limit {
                    warn!(thread = %thread_key, limit, "step limit reached");
                    return self
                        .fail(
                            thread_key,
                            state,
                            &current,
                            parent_id,
                            seq,
                            GraphError::StepLimit { limit }.into(),
                        )
                        .await;
                }
            }
            steps += 1;

            let node = self.graph.node(&current)?;
            debug!(thread = %thread_key, node = %current, step = steps, "invoking node");
            let output = match node.invoke(state.clone(), config.clone()).await {
                Ok(output) => output,
                Err(source) => {
                    let err = GraphError::NodeExecution {
                        node: current.clone(),
                        source: Box::new(source),
                    };
                    return self
                        .fail(thread_key, state, &current, parent_id, seq, err.into())
                        .await;
                }
            };

            match output {
                StepOutput::Suspend(prompt) => {
                    // State is untouched: suspension happens before the
                    // node does any work.
                    let checkpoint = Checkpoint::new(
                        thread_key,
                        parent_id,
                        seq,
                        state.clone(),
                        Some(current.clone()),
                        CheckpointSource::Interrupt,
                        Some(current.clone()),
                    );
                    self.store.put(checkpoint).await?;
                    self.set_status(thread_key, RunStatus::Suspended).await;
                    info!(thread = %thread_key, node = %current, "suspended");
                    return Ok(ExecutionResult {
                        status: RunStatus::Suspended,
                        state: state.clone(),
                        pending_node: Some(current),
                        prompt: Some(prompt),
                    });
                }
                StepOutput::Update(partial) => {
                    self.graph.schema().apply(state, &partial)?;
                }
            }

            let next = match self.graph.edge(&current)?.next(&current, state) {
                Ok(next) => next,
                Err(err) => {
                    return self
                        .fail(thread_key, state, &current, parent_id, seq, err)
                        .await;
                }
            };

            if next == TERMINAL {
                return self.complete(thread_key, state, parent_id, seq).await;
            }

            if config.checkpoint_each_step {
                let checkpoint = Checkpoint::new(
                    thread_key,
                    parent_id.clone(),
                    seq,
                    state.clone(),
                    Some(next.clone()),
                    CheckpointSource::Step,
                    Some(current.clone()),
                );
                let id = checkpoint.id.clone();
                self.store.put(checkpoint).await?;
                parent_id = Some(id);
                seq += 1;
            }

            current = next;
        }
    }

    async fn complete(
        &self,
        thread_key: &str,
        state: &Value,
        parent_id: Option<String>,
        seq: u64,
    ) -> Result<ExecutionResult> {
        let checkpoint = Checkpoint::new(
            thread_key,
            parent_id,
            seq,
            state.clone(),
            None,
            CheckpointSource::Complete,
            None,
        );
        self.store.put(checkpoint).await?;
        self.set_status(thread_key, RunStatus::Done).await;
        info!(thread = %thread_key, "run complete");
        Ok(ExecutionResult {
            status: RunStatus::Done,
            state: state.clone(),
            pending_node: None,
            prompt: None,
        })
    }

    /// Record a failure checkpoint holding the pre-failure state, mark
    /// the thread failed, and surface the error to the caller.
    async fn fail(
        &self,
        thread_key: &str,
        state: &Value,
        node: &str,
        parent_id: Option<String>,
        seq: u64,
        err: WeftError,
    ) -> Result<ExecutionResult> {
        let checkpoint = Checkpoint::new(
            thread_key,
            parent_id,
            seq,
            state.clone(),
            Some(node.to_string()),
            CheckpointSource::Failure,
            Some(node.to_string()),
        );
        self.store.put(checkpoint).await?;
        self.set_status(thread_key, RunStatus::Failed).await;
        warn!(thread = %thread_key, node = %node, error = %err, "run failed");
        Err(err)
    }
}
