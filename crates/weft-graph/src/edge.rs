use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use weft_core::error::{GraphError, Result};

/// A conditional edge: a router function over the merged state plus a
/// total map from route keys to destination node names.
///
/// Every key the router can return must appear in the map. An undeclared
/// key at execution time is a routing error, never a silent fallthrough.
#[derive(Clone)]
pub struct ConditionalEdge {
    router: Arc<dyn Fn(&Value) -> String + Send + Sync>,
    route_map: HashMap<String, String>,
}

impl ConditionalEdge {
    pub fn new<F>(router: F, route_map: HashMap<String, String>) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Self {
            router: Arc::new(router),
            route_map,
        }
    }

    pub fn route_map(&self) -> &HashMap<String, String> {
        &self.route_map
    }

    /// Run the router against `state` and look the key up in the map.
    pub fn resolve(&self, source: &str, state: &Value) -> Result<String> {
        let key = (self.router)(state);
        match self.route_map.get(&key) {
            Some(target) => Ok(target.clone()),
            None => Err(GraphError::Routing {
                node: source.to_string(),
                key,
            }
            .into()),
        }
    }
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("route_map", &self.route_map)
            .finish()
    }
}

/// The single outgoing edge of a node.
#[derive(Debug, Clone)]
pub enum Edge {
    /// Unconditional successor.
    Static(String),
    Conditional(ConditionalEdge),
}

impl Edge {
    /// Destination for the next step given the post-merge state.
    pub fn next(&self, source: &str, state: &Value) -> Result<String> {
        match self {
            Edge::Static(target) => Ok(target.clone()),
            Edge::Conditional(cond) => cond.resolve(source, state),
        }
    }

    /// All destinations this edge can name, for validation and lints.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Static(target) => vec![target.as_str()],
            Edge::Conditional(cond) => {
                cond.route_map.values().map(String::as_str).collect()
            }
        }
    }
}
