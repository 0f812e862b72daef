use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use weft_core::error::{GraphError, Result};

/// Merge strategy for one state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// New value replaces the old one. The default for undeclared fields.
    Overwrite,
    /// New value(s) are concatenated onto an ordered sequence. Used for
    /// conversation-message-like fields.
    Append,
}

/// Per-field reducer declarations for a graph's state.
///
/// Fields not declared here merge with `Overwrite` semantics.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    reducers: HashMap<String, Reducer>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, field: impl Into<String>, reducer: Reducer) {
        self.reducers.insert(field.into(), reducer);
    }

    pub fn reducer_for(&self, field: &str) -> Reducer {
        self.reducers
            .get(field)
            .copied()
            .unwrap_or(Reducer::Overwrite)
    }

    /// Merge a partial update into `current`.
    ///
    /// Keys absent from the partial are left untouched. For an `Append`
    /// field the current value defaults to an empty sequence when absent;
    /// an array-valued partial is concatenated element-wise and any other
    /// value is appended as a single element.
    pub fn apply(&self, current: &mut Value, partial: &Value) -> Result<()> {
        if partial.is_null() {
            return Ok(());
        }
        let partial_map = partial.as_object().ok_or_else(|| {
            GraphError::Reducer(format!(
                "partial update must be an object, got {partial}"
            ))
        })?;
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Some(current_map) = current.as_object_mut() else {
            return Err(GraphError::Reducer("state is not an object".into()).into());
        };

        for (key, value) in partial_map {
            match self.reducer_for(key) {
                Reducer::Overwrite => {
                    current_map.insert(key.clone(), value.clone());
                }
                Reducer::Append => {
                    let entry = current_map
                        .entry(key.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    let seq = entry.as_array_mut().ok_or_else(|| {
                        GraphError::Reducer(format!(
                            "append field '{key}' holds a non-sequence value"
                        ))
                    })?;
                    match value {
                        Value::Array(items) => seq.extend(items.iter().cloned()),
                        other => seq.push(other.clone()),
                    }
                }
            }
        }

        Ok(())
    }
}
