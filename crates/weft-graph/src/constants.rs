/// Sentinel name for the graph's entry pseudo-node. It has no step
/// function; its single outgoing edge names the first real node.
pub const ENTRY: &str = "__entry__";

/// Sentinel name for the terminal pseudo-node. Routing here ends the run.
pub const TERMINAL: &str = "__terminal__";

/// Whether a name is one of the reserved pseudo-nodes.
pub fn is_sentinel(name: &str) -> bool {
    name == ENTRY || name == TERMINAL
}
