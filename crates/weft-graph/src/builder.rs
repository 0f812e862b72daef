use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;

use serde_json::Value;
use tracing::warn;

use weft_core::config::RunConfig;
use weft_core::error::{GraphError, Result};

use crate::constants::{ENTRY, TERMINAL, is_sentinel};
use crate::edge::{ConditionalEdge, Edge};
use crate::graph::Graph;
use crate::node::{Node, StepOutput};
use crate::reducer::{Reducer, StateSchema};

/// Fluent builder for a [`Graph`]. All structural validation happens in
/// [`build`](GraphBuilder::build) so construction can stay chainable.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<(String, Edge)>,
    schema: StateSchema,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the reducer for one state field. Undeclared fields
    /// overwrite on merge.
    pub fn declare_field(mut self, field: impl Into<String>, reducer: Reducer) -> Self {
        self.schema.declare(field, reducer);
        self
    }

    pub fn add_node<F, Fut>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, RunConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput>> + Send + 'static,
    {
        self.nodes.push(Node::new(name, func));
        self
    }

    /// Unconditional edge from `source` to `target`. `target` may be
    /// [`TERMINAL`].
    pub fn add_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges
            .push((source.into(), Edge::Static(target.into())));
        self
    }

    /// Conditional edge from `source`. The router runs over the post-merge
    /// state; its return value must be a key of `routes`.
    pub fn add_conditional_edge<F>(
        mut self,
        source: impl Into<String>,
        router: F,
        routes: HashMap<String, String>,
    ) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.edges.push((
            source.into(),
            Edge::Conditional(ConditionalEdge::new(router, routes)),
        ));
        self
    }

    /// Name the node runs start at. Equivalent to an edge from the entry
    /// pseudo-node.
    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Validate the structure and freeze it into an immutable [`Graph`].
    pub fn build(self) -> Result<Graph> {
        let mut nodes: HashMap<String, Node> = HashMap::new();
        for node in self.nodes {
            let name = node.name().to_string();
            if name.is_empty() {
                return Err(GraphError::Validation("node name must not be empty".into()).into());
            }
            if is_sentinel(&name) {
                return Err(GraphError::Validation(format!(
                    "'{name}' is a reserved pseudo-node name"
                ))
                .into());
            }
            if nodes.insert(name.clone(), node).is_some() {
                return Err(
                    GraphError::Validation(format!("duplicate node '{name}'")).into(),
                );
            }
        }

        let mut entry = self.entry;
        let mut edges: HashMap<String, Edge> = HashMap::new();
        for (source, edge) in self.edges {
            if source == TERMINAL {
                return Err(GraphError::Validation(
                    "the terminal pseudo-node cannot have outgoing edges".into(),
                )
                .into());
            }
            // An edge out of the entry pseudo-node is another way to name
            // the start; the entry must end up with exactly one successor.
            if source == ENTRY {
                let Edge::Static(target) = edge else {
                    return Err(GraphError::Validation(
                        "the entry pseudo-node's edge must be static".into(),
                    )
                    .into());
                };
                if entry.replace(target).is_some() {
                    return Err(GraphError::Validation(
                        "the entry pseudo-node has more than one outgoing edge".into(),
                    )
                    .into());
                }
                continue;
            }
            if !nodes.contains_key(&source) {
                return Err(GraphError::Validation(format!(
                    "edge source '{source}' is not a node"
                ))
                .into());
            }
            if let Edge::Conditional(cond) = &edge {
                if cond.route_map().is_empty() {
                    return Err(GraphError::Validation(format!(
                        "conditional edge on '{source}' has an empty route map"
                    ))
                    .into());
                }
            }
            for target in edge.targets() {
                if target == ENTRY {
                    return Err(GraphError::Validation(
                        "the entry pseudo-node cannot be an edge target".into(),
                    )
                    .into());
                }
                if target != TERMINAL && !nodes.contains_key(target) {
                    return Err(GraphError::Validation(format!(
                        "edge from '{source}' targets unknown node '{target}'"
                    ))
                    .into());
                }
            }
            if edges.insert(source.clone(), edge).is_some() {
                return Err(GraphError::Validation(format!(
                    "node '{source}' has more than one outgoing edge"
                ))
                .into());
            }
        }

        let entry = entry.ok_or_else(|| GraphError::Validation("no entry point set".into()))?;
        if !nodes.contains_key(&entry) {
            return Err(GraphError::Validation(format!(
                "entry point '{entry}' is not a node"
            ))
            .into());
        }

        // Every real node needs exactly one way forward.
        for name in nodes.keys() {
            if !edges.contains_key(name) {
                return Err(GraphError::Validation(format!(
                    "node '{name}' has no outgoing edge"
                ))
                .into());
            }
        }

        let graph = Graph {
            nodes,
            edges,
            schema: self.schema,
            entry,
        };
        warn_unreachable(&graph);
        Ok(graph)
    }
}

/// BFS from the entry over all possible edge targets. Unreachable nodes
/// are legal but almost always a mistake, so they get a warning.
fn warn_unreachable(graph: &Graph) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(graph.entry.as_str());
    queue.push_back(graph.entry.as_str());

    while let Some(current) = queue.pop_front() {
        if let Some(edge) = graph.edges.get(current) {
            for target in edge.targets() {
                if target != TERMINAL && seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }

    for name in graph.nodes.keys() {
        if !seen.contains(name.as_str()) {
            warn!(node = %name, "node is unreachable from the entry point");
        }
    }
}
