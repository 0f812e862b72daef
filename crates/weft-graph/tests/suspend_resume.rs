use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use weft_checkpoint::memory::MemoryCheckpointStore;
use weft_checkpoint::sqlite::SqliteCheckpointStore;
use weft_checkpoint::types::CheckpointSource;
use weft_core::config::RunConfig;
use weft_core::error::{GraphError, WeftError};
use weft_graph::prelude::*;

/// Draft, pause for approval, then publish or loop back through a
/// revision step until someone approves.
fn approval_graph() -> Graph {
    GraphBuilder::new()
        .declare_field("log", Reducer::Append)
        .add_node("draft", |_state: Value, _config| async move {
            Ok(StepOutput::Update(
                json!({"document": "v1", "log": ["drafted"]}),
            ))
        })
        .add_node("review", |_state: Value, _config| async move {
            Ok(StepOutput::suspend(json!("approve?")))
        })
        .add_node("revise", |state: Value, _config| async move {
            let revision = state["revision"].as_i64().unwrap_or(0) + 1;
            Ok(StepOutput::Update(json!({
                "document": format!("v{}", revision + 1),
                "revision": revision,
                "log": ["revised"],
            })))
        })
        .add_node("publish", |_state: Value, _config| async move {
            Ok(StepOutput::Update(
                json!({"published": true, "log": ["published"]}),
            ))
        })
        .add_edge("draft", "review")
        .add_conditional_edge(
            "review",
            |state| {
                if state["approved"].as_bool().unwrap_or(false) {
                    "approved".to_string()
                } else {
                    "rejected".to_string()
                }
            },
            HashMap::from([
                ("approved".to_string(), "publish".to_string()),
                ("rejected".to_string(), "revise".to_string()),
            ]),
        )
        .add_edge("revise", "review")
        .add_edge("publish", TERMINAL)
        .set_entry("draft")
        .build()
        .unwrap()
}

fn executor(graph: Graph) -> Executor {
    Executor::new(graph, Arc::new(MemoryCheckpointStore::new()))
}

#[tokio::test]
async fn suspension_snapshots_state_before_the_node_runs() {
    let exec = executor(approval_graph());
    let result = exec
        .run("t1", json!({}), RunConfig::default())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Suspended);
    assert_eq!(result.pending_node.as_deref(), Some("review"));
    assert_eq!(result.prompt, Some(json!("approve?")));
    // Draft's update is in; review touched nothing.
    assert_eq!(result.state["document"], json!("v1"));
    assert_eq!(result.state["log"], json!(["drafted"]));

    let history = exec.history("t1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].metadata.source, CheckpointSource::Interrupt);
    assert_eq!(history[0].pending_node.as_deref(), Some("review"));
    assert_eq!(history[0].state, result.state);

    let report = exec.status("t1").await.unwrap();
    assert_eq!(report.status, RunStatus::Suspended);
    assert_eq!(report.pending_node.as_deref(), Some("review"));
}

#[tokio::test]
async fn resume_routes_without_reinvoking_the_paused_node() {
    let exec = executor(approval_graph());
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();

    let result = exec
        .resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.state["published"], json!(true));
    // Had review run again it would have suspended; the log shows only
    // the nodes that actually executed.
    assert_eq!(result.state["log"], json!(["drafted", "published"]));
}

#[tokio::test]
async fn rejection_loops_back_until_approved() {
    let exec = executor(approval_graph());
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();

    // Reject: routes to revise, which loops to review and suspends again.
    let result = exec
        .resume("t1", json!({"approved": false}), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Suspended);
    assert_eq!(result.pending_node.as_deref(), Some("review"));
    assert_eq!(result.state["document"], json!("v2"));
    assert_eq!(result.state["revision"], json!(1));
    assert_eq!(result.state["log"], json!(["drafted", "revised"]));

    // Approve the revision.
    let result = exec
        .resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.state["document"], json!("v2"));
    assert_eq!(
        result.state["log"],
        json!(["drafted", "revised", "published"])
    );
}

#[tokio::test]
async fn checkpoint_chain_spans_suspensions() {
    let exec = executor(approval_graph());
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();
    exec.resume("t1", json!({"approved": false}), RunConfig::default())
        .await
        .unwrap();
    exec.resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();

    let history = exec.history("t1").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].metadata.source, CheckpointSource::Interrupt);
    assert_eq!(history[1].metadata.source, CheckpointSource::Interrupt);
    assert_eq!(history[2].metadata.source, CheckpointSource::Complete);
    assert_eq!(history[1].parent_id.as_deref(), Some(history[0].id.as_str()));
    assert_eq!(history[2].parent_id.as_deref(), Some(history[1].id.as_str()));
    assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[tokio::test]
async fn resume_without_suspension_is_an_error() {
    let exec = executor(approval_graph());
    let err = exec
        .resume("never-ran", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WeftError::Graph(GraphError::NoPendingExecution(_))
    ));
}

#[tokio::test]
async fn resume_after_completion_is_an_error() {
    let exec = executor(approval_graph());
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();
    exec.resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();

    let err = exec
        .resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WeftError::Graph(GraphError::NoPendingExecution(_))
    ));
}

#[tokio::test]
async fn run_on_a_suspended_thread_reinvokes_the_node() {
    let exec = executor(approval_graph());
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();

    // `run` re-enters at the pending node and invokes it, so review
    // suspends a second time.
    let result = exec
        .run("t1", json!({"note": "second attempt"}), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Suspended);
    assert_eq!(result.pending_node.as_deref(), Some("review"));
    assert_eq!(result.state["note"], json!("second attempt"));
    assert_eq!(result.state["document"], json!("v1"));

    let history = exec.history("t1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|cp| cp.metadata.source == CheckpointSource::Interrupt));
}

#[tokio::test]
async fn resume_survives_a_process_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads.db");

    {
        let store = Arc::new(SqliteCheckpointStore::open(&path).unwrap());
        let exec = Executor::new(approval_graph(), store);
        let result = exec
            .run("t1", json!({}), RunConfig::default())
            .await
            .unwrap();
        assert_eq!(result.status, RunStatus::Suspended);
    }

    // A fresh executor over a fresh store handle sees the suspension.
    let store = Arc::new(SqliteCheckpointStore::open(&path).unwrap());
    let exec = Executor::new(approval_graph(), store);
    let report = exec.status("t1").await.unwrap();
    assert_eq!(report.status, RunStatus::Suspended);
    assert_eq!(report.pending_node.as_deref(), Some("review"));

    let result = exec
        .resume("t1", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();
    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.state["published"], json!(true));
}

#[tokio::test]
async fn suspended_flow_matches_a_straight_through_run() {
    // The same graph with approval supplied up front never suspends if
    // review is replaced by a pass-through; the merged result of the
    // suspend-and-resume path must match what the updates alone produce.
    let exec = executor(approval_graph());
    exec.run("paused", json!({}), RunConfig::default()).await.unwrap();
    let resumed = exec
        .resume("paused", json!({"approved": true}), RunConfig::default())
        .await
        .unwrap();

    let straight = GraphBuilder::new()
        .declare_field("log", Reducer::Append)
        .add_node("draft", |_state: Value, _config| async move {
            Ok(StepOutput::Update(
                json!({"document": "v1", "log": ["drafted"]}),
            ))
        })
        .add_node("approve", |_state: Value, _config| async move {
            Ok(StepOutput::Update(json!({"approved": true})))
        })
        .add_node("publish", |_state: Value, _config| async move {
            Ok(StepOutput::Update(
                json!({"published": true, "log": ["published"]}),
            ))
        })
        .add_edge("draft", "approve")
        .add_edge("approve", "publish")
        .add_edge("publish", TERMINAL)
        .set_entry("draft")
        .build()
        .unwrap();
    let exec2 = executor(straight);
    let direct = exec2
        .run("direct", json!({}), RunConfig::default())
        .await
        .unwrap();

    assert_eq!(resumed.state, direct.state);
}

#[tokio::test]
async fn concurrent_runs_on_one_thread_are_rejected() {
    let graph = GraphBuilder::new()
        .add_node("slow", |_state: Value, _config| async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(StepOutput::Update(json!({"done": true})))
        })
        .add_edge("slow", TERMINAL)
        .set_entry("slow")
        .build()
        .unwrap();
    let exec = Arc::new(executor(graph));

    let background = {
        let exec = Arc::clone(&exec);
        tokio::spawn(async move { exec.run("t1", json!({}), RunConfig::default()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = exec
        .run("t1", json!({}), RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WeftError::Graph(GraphError::ConcurrentExecution(_))
    ));

    // A different thread key is unaffected.
    exec.run("t2", json!({}), RunConfig::default()).await.unwrap();

    let first = background.await.unwrap().unwrap();
    assert_eq!(first.status, RunStatus::Done);

    // The slot frees up once the first run finishes.
    exec.run("t1-again", json!({}), RunConfig::default())
        .await
        .unwrap();
    exec.run("t1", json!({}), RunConfig::default()).await.unwrap();
}
