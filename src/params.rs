//! Parameter binding: turns a generic [`ParameterMap`] into parameters attached
//! to a [`Command`], building table-valued parameters from structured values.

use tracing::trace;

use crate::type_map::{SqlDbType, sql_db_type};
use crate::types::{ParameterMap, StructuredValue, Value};

/// How the command text is interpreted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Literal SQL text.
    Text,
    /// The text is a stored procedure name.
    StoredProcedure,
}

/// A command ready to execute: text, interpretation, and bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<BoundParameter>,
}

impl Command {
    pub fn new(text: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            text: text.into(),
            kind,
            parameters: Vec::new(),
        }
    }
}

/// One named parameter attached to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub value: BoundValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// A scalar; `Value::Null` binds as the database null marker.
    Scalar(Value),
    /// A table-valued parameter.
    Table(TableParameter),
}

/// Server-side tabular representation of a structured value.
///
/// The server-defined table type is authoritative: cells fill its columns by
/// position, and `columns` only describes what the host sent. A driver that
/// cannot send typed table metadata may ignore the inferred `sql_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableParameter {
    /// Name of the server-defined table type.
    pub type_name: String,
    /// Column schema inferred from the first row; empty when there are no rows.
    pub columns: Vec<TableColumn>,
    /// Row cells in original order, positionally matching `columns`.
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub sql_type: SqlDbType,
}

/// Attach every entry of `parameters` to `command`, in map order.
///
/// An absent map binds nothing. Duplicate names cannot occur: [`ParameterMap`]
/// keeps the last value written for a name.
pub fn bind_parameters(command: &mut Command, parameters: Option<&ParameterMap>) {
    let Some(parameters) = parameters else {
        return;
    };
    command.parameters.reserve(parameters.len());
    for (name, value) in parameters.iter() {
        let value = match value {
            Value::Structured(structured) => BoundValue::Table(build_table_parameter(structured)),
            scalar => BoundValue::Scalar(scalar.clone()),
        };
        trace!(parameter = name, "bound parameter");
        command.parameters.push(BoundParameter {
            name: name.to_string(),
            value,
        });
    }
}

/// Build a table parameter, taking the column schema from the first row.
///
/// Later rows contribute their values positionally; they are not checked
/// against the schema here, the server rejects rows that do not fit.
#[must_use]
pub fn build_table_parameter(structured: &StructuredValue) -> TableParameter {
    let columns = structured
        .rows
        .first()
        .map(|first| {
            first
                .iter()
                .map(|(name, value)| TableColumn {
                    name: name.to_string(),
                    sql_type: sql_db_type(value.kind()),
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = structured
        .rows
        .iter()
        .map(|row| row.values().cloned().collect())
        .collect();

    TableParameter {
        type_name: structured.type_name.clone(),
        columns,
        rows,
    }
}
