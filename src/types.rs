use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use tiberius::Uuid;

use crate::error::SqlDispatchError;
use crate::type_map::ValueKind;

/// Key that marks a host object as a table-valued parameter.
pub const UDT_TYPE_KEY: &str = "UdtType";
/// Key holding the rows of a table-valued parameter.
pub const UDT_ROWS_KEY: &str = "Rows";

/// Generic values passed in by the host as parameters or structured-parameter cells.
///
/// ```rust
/// use sql_dispatch::prelude::*;
///
/// let mut params = ParameterMap::new();
/// params.insert("id", Value::Int(7));
/// params.insert("name", Value::Text("Ann".into()));
/// params.insert("deleted_at", Value::Null);
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value; binds as the database null marker
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp value
    DateTime(NaiveDateTime),
    /// Unique identifier
    Uuid(Uuid),
    /// Table-valued parameter
    Structured(StructuredValue),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The generic kind of this value, used to infer structured-parameter column types.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Variant,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int64,
            Value::Float(_) => ValueKind::Float64,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Binary,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Structured(_) => ValueKind::Table,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_structured(&self) -> Option<&StructuredValue> {
        if let Value::Structured(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<StructuredValue> for Value {
    fn from(value: StructuredValue) -> Self {
        Value::Structured(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A table-valued parameter: a server-defined table type name plus its rows.
///
/// The first row fixes the column schema for the whole sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredValue {
    pub type_name: String,
    pub rows: Vec<RowMap>,
}

impl StructuredValue {
    pub fn new(type_name: impl Into<String>, rows: Vec<RowMap>) -> Self {
        Self {
            type_name: type_name.into(),
            rows,
        }
    }
}

/// Insertion-ordered name → value map.
///
/// Inserting a name that is already present replaces its value in place
/// (last write wins, first position kept). Names are compared exactly, so
/// `id` and `@id` are separate entries; binding both to one command fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
}

/// One row of a structured value.
pub type RowMap = ValueMap;
/// Parameters supplied to a compiled command at call time.
pub type ParameterMap = ValueMap;

impl ValueMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for `name` if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((name, value));
        None
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl TryFrom<JsonValue> for Value {
    type Error = SqlDispatchError;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        Ok(match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| {
                    SqlDispatchError::ParameterError(format!("number out of range: {n}"))
                })?),
            },
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Object(mut obj) if obj.contains_key(UDT_TYPE_KEY) => {
                let type_name = match obj.remove(UDT_TYPE_KEY) {
                    Some(JsonValue::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let rows = match obj.remove(UDT_ROWS_KEY) {
                    None | Some(JsonValue::Null) => Vec::new(),
                    Some(JsonValue::Array(rows)) => rows
                        .into_iter()
                        .map(RowMap::try_from)
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(other) => {
                        return Err(SqlDispatchError::ParameterError(format!(
                            "`{UDT_ROWS_KEY}` of structured value {type_name} must be an array, got {other}"
                        )));
                    }
                };
                Value::Structured(StructuredValue { type_name, rows })
            }
            // Plain objects and arrays travel as their JSON text.
            other @ (JsonValue::Object(_) | JsonValue::Array(_)) => Value::Text(other.to_string()),
        })
    }
}

impl TryFrom<JsonValue> for ValueMap {
    type Error = SqlDispatchError;

    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        match json {
            JsonValue::Object(obj) => {
                let mut map = ValueMap::new();
                for (key, value) in obj {
                    map.insert(key, Value::try_from(value)?);
                }
                Ok(map)
            }
            other => Err(SqlDispatchError::ParameterError(format!(
                "expected an object of named values, got {other}"
            ))),
        }
    }
}

/// Convert a host-supplied parameter object; `null` means no parameters.
///
/// # Errors
/// Returns `SqlDispatchError::ParameterError` if `json` is neither `null` nor an object,
/// or if a structured value is malformed.
pub fn parameters_from_json(json: JsonValue) -> Result<Option<ParameterMap>, SqlDispatchError> {
    match json {
        JsonValue::Null => Ok(None),
        other => ParameterMap::try_from(other).map(Some),
    }
}
