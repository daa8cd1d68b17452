use serde::Serialize;
use serde_json::Value as JsonValue;

use super::row::Row;

/// Rows of every result set a command produced.
///
/// A single result set is returned unwrapped; two or more come back as a
/// sequence of sequences, even when some of them are empty. Which shape a
/// command yields depends on what the server returned for that execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Single(Vec<Row>),
    Multiple(Vec<Vec<Row>>),
}

impl ResultValue {
    /// Collapse drained result sets into the caller-facing shape.
    ///
    /// A command that produced no result set at all reads as one empty set.
    #[must_use]
    pub fn from_result_sets(mut result_sets: Vec<Vec<Row>>) -> Self {
        match result_sets.len() {
            0 => ResultValue::Single(Vec::new()),
            1 => ResultValue::Single(result_sets.remove(0)),
            _ => ResultValue::Multiple(result_sets),
        }
    }

    /// Number of result sets represented.
    #[must_use]
    pub fn result_set_count(&self) -> usize {
        match self {
            ResultValue::Single(_) => 1,
            ResultValue::Multiple(sets) => sets.len(),
        }
    }

    /// Rows of the only result set, if this is a single result set.
    #[must_use]
    pub fn as_single(&self) -> Option<&[Row]> {
        match self {
            ResultValue::Single(rows) => Some(rows),
            ResultValue::Multiple(_) => None,
        }
    }

    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            ResultValue::Single(rows) => rows_to_json(rows),
            ResultValue::Multiple(sets) => {
                JsonValue::Array(sets.into_iter().map(rows_to_json).collect())
            }
        }
    }
}

fn rows_to_json(rows: Vec<Row>) -> JsonValue {
    JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())
}
