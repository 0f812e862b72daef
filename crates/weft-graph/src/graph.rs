use std::collections::HashMap;

use weft_core::error::{GraphError, Result};

use crate::edge::Edge;
use crate::node::Node;
use crate::reducer::StateSchema;

/// An immutable, validated graph. Built through
/// [`GraphBuilder`](crate::builder::GraphBuilder); execution happens in
/// [`Executor`](crate::executor::Executor).
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) edges: HashMap<String, Edge>,
    pub(crate) schema: StateSchema,
    pub(crate) entry: String,
}

impl Graph {
    /// Name of the first real node, the one the entry edge points at.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub(crate) fn node(&self, name: &str) -> Result<&Node> {
        self.nodes.get(name).ok_or_else(|| {
            GraphError::Validation(format!("unknown node '{name}'")).into()
        })
    }

    pub(crate) fn edge(&self, name: &str) -> Result<&Edge> {
        self.edges.get(name).ok_or_else(|| {
            GraphError::Validation(format!("node '{name}' has no outgoing edge")).into()
        })
    }
}
