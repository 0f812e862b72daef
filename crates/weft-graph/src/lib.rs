//! Graph definition and execution for Weft.
//!
//! A graph is a set of named async nodes joined by static and conditional
//! edges, with cycles allowed. Nodes read a merged state snapshot and
//! return partial updates that a per-field reducer schema folds back in.
//! The executor drives one node at a time, checkpointing through a
//! pluggable store so a run can suspend for outside input and resume
//! later, on this process or another one.

pub mod builder;
pub mod constants;
pub mod edge;
pub mod executor;
pub mod graph;
pub mod node;
pub mod reducer;

pub mod prelude {
    pub use crate::builder::GraphBuilder;
    pub use crate::constants::{ENTRY, TERMINAL};
    pub use crate::edge::{ConditionalEdge, Edge};
    pub use crate::executor::{ExecutionResult, Executor, RunStatus, StatusReport};
    pub use crate::graph::Graph;
    pub use crate::node::{Node, StepOutput};
    pub use crate::reducer::{Reducer, StateSchema};
}
