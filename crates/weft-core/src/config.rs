use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for a single graph invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Unique identifier for this run.
    pub run_id: Uuid,

    /// Arbitrary metadata key-value pairs, passed through to node functions.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Optional cap on scheduler steps. `None` (the default) imposes no
    /// bound; cyclic graphs are then expected to terminate via their own
    /// routing logic.
    #[serde(default)]
    pub max_steps: Option<usize>,

    /// Persist a checkpoint after every step, not only at suspend and
    /// completion. A durability policy, not required for correctness.
    #[serde(default)]
    pub checkpoint_each_step: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            metadata: HashMap::new(),
            max_steps: None,
            checkpoint_each_step: false,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_max_steps(mut self, limit: usize) -> Self {
        self.max_steps = Some(limit);
        self
    }

    pub fn with_checkpoint_each_step(mut self, enabled: bool) -> Self {
        self.checkpoint_each_step = enabled;
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RunConfig::default();
        assert!(config.metadata.is_empty());
        assert!(config.max_steps.is_none());
        assert!(!config.checkpoint_each_step);
    }

    #[test]
    fn builder_methods() {
        let config = RunConfig::new()
            .with_metadata("caller", serde_json::json!("cli"))
            .with_max_steps(100)
            .with_checkpoint_each_step(true);

        assert_eq!(config.metadata["caller"], serde_json::json!("cli"));
        assert_eq!(config.max_steps, Some(100));
        assert!(config.checkpoint_each_step);
    }

    #[test]
    fn run_id_uniqueness() {
        let a = RunConfig::new();
        let b = RunConfig::new();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn with_explicit_run_id() {
        let id = Uuid::new_v4();
        let config = RunConfig::new().with_run_id(id);
        assert_eq!(config.run_id, id);
    }

    #[test]
    fn serde_roundtrip() {
        let config = RunConfig::new().with_max_steps(10);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.run_id, config.run_id);
        assert_eq!(deserialized.max_steps, Some(10));
    }
}
