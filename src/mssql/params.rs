//! Rendering of bound parameters for tiberius.
//!
//! tiberius binds positional `@P1..@Pn` parameters only and cannot send
//! table-valued parameters, so every call is prefixed with a prologue that
//! declares one local variable per named parameter:
//!
//! ```sql
//! SET NOCOUNT ON;
//! DECLARE @id bigint = @P1;
//! DECLARE @rows dbo.RowType;
//! INSERT INTO @rows VALUES (1, N'x'), (2, N'y');
//! SET NOCOUNT OFF;
//! select * from users where id = @id
//! ```
//!
//! Scalars travel as bound values. Table rows are inlined as escaped literals,
//! which keeps large tables clear of the 2100-parameter limit. Row cells fill
//! the table type's columns by position; the host's column names are labels
//! only.

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::NaiveDateTime;
use tiberius::{ColumnData, IntoSql, Query, Uuid};
use tracing::trace;

use crate::error::SqlDispatchError;
use crate::params::{BoundValue, Command, CommandKind, TableParameter};
use crate::results::format_timestamp;
use crate::types::Value;

/// SQL Server accepts at most this many rows in one `VALUES` list.
const MAX_ROWS_PER_INSERT: usize = 1000;

/// Owned scalar parameter for tiberius.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    Guid(Uuid),
}

impl<'a> IntoSql<'a> for SqlParam {
    fn into_sql(self) -> ColumnData<'a> {
        match self {
            SqlParam::Null => ColumnData::String(None),
            SqlParam::Bool(b) => ColumnData::Bit(Some(b)),
            SqlParam::Int(i) => ColumnData::I64(Some(i)),
            SqlParam::Float(f) => ColumnData::F64(Some(f)),
            SqlParam::Text(s) => ColumnData::String(Some(Cow::Owned(s))),
            SqlParam::Binary(bytes) => ColumnData::Binary(Some(Cow::Owned(bytes))),
            SqlParam::DateTime(ts) => ts.into_sql(),
            SqlParam::Guid(guid) => ColumnData::Guid(Some(guid)),
        }
    }
}

/// Final SQL text plus the values for its `@Pn` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCommand {
    pub sql: String,
    pub binds: Vec<SqlParam>,
}

impl RenderedCommand {
    #[must_use]
    pub fn into_query(self) -> Query<'static> {
        let mut query = Query::new(self.sql);
        for param in self.binds {
            query.bind(param);
        }
        query
    }
}

/// Render a bound command into SQL text tiberius can execute.
///
/// # Errors
/// Returns `SqlDispatchError::ParameterError` for a parameter or table type name
/// that is not a plain identifier, or a table cell that has no literal form.
pub fn render_command(command: &Command) -> Result<RenderedCommand, SqlDispatchError> {
    if command.parameters.is_empty() && command.kind == CommandKind::Text {
        return Ok(RenderedCommand {
            sql: command.text.clone(),
            binds: Vec::new(),
        });
    }

    let mut sql = String::new();
    let mut binds = Vec::new();
    let mut names: Vec<&str> = Vec::with_capacity(command.parameters.len());

    if !command.parameters.is_empty() {
        sql.push_str("SET NOCOUNT ON;\n");
    }
    for parameter in &command.parameters {
        let name = variable_name(&parameter.name)?;
        if names.iter().any(|seen| seen.to_lowercase() == name.to_lowercase()) {
            return Err(SqlDispatchError::ParameterError(format!(
                "parameter {:?} is bound more than once",
                parameter.name
            )));
        }
        match &parameter.value {
            BoundValue::Scalar(value) => {
                let param = scalar_param(value)?;
                binds.push(param);
                let _ = writeln!(
                    sql,
                    "DECLARE @{name} {} = @P{};",
                    declared_type(value),
                    binds.len()
                );
            }
            BoundValue::Table(table) => render_table(&mut sql, name, table)?,
        }
        names.push(name);
    }
    if !command.parameters.is_empty() {
        sql.push_str("SET NOCOUNT OFF;\n");
    }

    match command.kind {
        CommandKind::Text => sql.push_str(&command.text),
        CommandKind::StoredProcedure => {
            let _ = write!(sql, "EXEC {}", command.text);
            for (i, name) in names.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                let _ = write!(sql, "{sep}@{name} = @{name}");
            }
            sql.push(';');
        }
    }

    trace!(binds = binds.len(), "rendered command");
    Ok(RenderedCommand { sql, binds })
}

fn scalar_param(value: &Value) -> Result<SqlParam, SqlDispatchError> {
    Ok(match value {
        Value::Null => SqlParam::Null,
        Value::Bool(b) => SqlParam::Bool(*b),
        Value::Int(i) => SqlParam::Int(*i),
        Value::Float(f) => SqlParam::Float(*f),
        Value::Text(s) => SqlParam::Text(s.clone()),
        Value::Bytes(bytes) => SqlParam::Binary(bytes.clone()),
        Value::DateTime(ts) => SqlParam::DateTime(*ts),
        Value::Uuid(guid) => SqlParam::Guid(*guid),
        Value::Structured(structured) => {
            return Err(SqlDispatchError::ParameterError(format!(
                "structured value {} bound as a scalar",
                structured.type_name
            )));
        }
    })
}

/// Type of the local variable receiving a scalar; matches what tiberius sends.
/// NULL travels as `nvarchar`, the same as an untyped ADO.NET null.
fn declared_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "nvarchar(4000)",
        Value::Bool(_) => "bit",
        Value::Int(_) => "bigint",
        Value::Float(_) => "float",
        Value::Text(_) => "nvarchar(max)",
        Value::Bytes(_) => "varbinary(max)",
        Value::DateTime(_) => "datetime2",
        Value::Uuid(_) => "uniqueidentifier",
        Value::Structured(_) => "sql_variant",
    }
}

fn render_table(
    sql: &mut String,
    name: &str,
    table: &TableParameter,
) -> Result<(), SqlDispatchError> {
    check_type_name(&table.type_name)?;
    let _ = writeln!(sql, "DECLARE @{name} {};", table.type_name);
    if table.columns.is_empty() {
        return Ok(());
    }

    for chunk in table.rows.chunks(MAX_ROWS_PER_INSERT) {
        let _ = write!(sql, "INSERT INTO @{name} VALUES ");
        for (i, row) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, cell) in row.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                push_literal(sql, cell)?;
            }
            sql.push(')');
        }
        sql.push_str(";\n");
    }
    Ok(())
}

fn push_literal(sql: &mut String, value: &Value) -> Result<(), SqlDispatchError> {
    match value {
        Value::Null => sql.push_str("NULL"),
        Value::Bool(b) => sql.push(if *b { '1' } else { '0' }),
        Value::Int(i) => {
            let _ = write!(sql, "{i}");
        }
        Value::Float(f) if f.is_finite() => {
            let _ = write!(sql, "{f:e}");
        }
        Value::Float(f) => {
            return Err(SqlDispatchError::ParameterError(format!(
                "{f} has no SQL Server literal"
            )));
        }
        Value::Text(s) => push_string_literal(sql, s),
        Value::Bytes(bytes) => {
            sql.push_str("0x");
            for byte in bytes {
                let _ = write!(sql, "{byte:02X}");
            }
        }
        Value::DateTime(ts) => {
            let _ = write!(sql, "CAST('{}' AS datetime2)", format_timestamp(*ts));
        }
        Value::Uuid(guid) => {
            let _ = write!(sql, "CAST('{guid}' AS uniqueidentifier)");
        }
        Value::Structured(structured) => {
            return Err(SqlDispatchError::ParameterError(format!(
                "structured value {} cannot be a table cell",
                structured.type_name
            )));
        }
    }
    Ok(())
}

fn push_string_literal(sql: &mut String, s: &str) {
    sql.push_str("N'");
    for ch in s.chars() {
        if ch == '\'' {
            sql.push('\'');
        }
        sql.push(ch);
    }
    sql.push('\'');
}

/// Parameter name without its optional leading `@`.
fn variable_name(name: &str) -> Result<&str, SqlDispatchError> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    let mut chars = bare.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '#');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '#' | '$' | '@'));
    if !valid_start || !valid_rest {
        return Err(SqlDispatchError::ParameterError(format!(
            "invalid parameter name: {name:?}"
        )));
    }
    if is_positional_name(bare) {
        return Err(SqlDispatchError::ParameterError(format!(
            "parameter name {name:?} collides with positional parameter names"
        )));
    }
    Ok(bare)
}

// `P1`, `p23`, ... are taken by the positional parameters.
fn is_positional_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('P' | 'p'))
        && !name[1..].is_empty()
        && name[1..].bytes().all(|b| b.is_ascii_digit())
}

fn check_type_name(type_name: &str) -> Result<(), SqlDispatchError> {
    let valid = !type_name.is_empty()
        && type_name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '#' | '$'));
    if valid {
        Ok(())
    } else {
        Err(SqlDispatchError::ParameterError(format!(
            "invalid table type name: {type_name:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::bind_parameters;
    use crate::types::{ParameterMap, RowMap, StructuredValue};

    fn bound(text: &str, kind: CommandKind, params: &ParameterMap) -> Command {
        let mut command = Command::new(text, kind);
        bind_parameters(&mut command, Some(params));
        command
    }

    #[test]
    fn plain_text_without_parameters_is_untouched() {
        let command = Command::new("select 1 as one", CommandKind::Text);
        let rendered = render_command(&command).unwrap();
        assert_eq!(rendered.sql, "select 1 as one");
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn scalars_become_declared_variables() {
        let params: ParameterMap = [
            ("@id", Value::Int(7)),
            ("name", Value::Text("Ann".into())),
            ("gone", Value::Null),
        ]
        .into_iter()
        .collect();
        let command = bound("select * from users where id = @id", CommandKind::Text, &params);
        let rendered = render_command(&command).unwrap();

        assert_eq!(
            rendered.sql,
            "SET NOCOUNT ON;\n\
             DECLARE @id bigint = @P1;\n\
             DECLARE @name nvarchar(max) = @P2;\n\
             DECLARE @gone nvarchar(4000) = @P3;\n\
             SET NOCOUNT OFF;\n\
             select * from users where id = @id"
        );
        assert_eq!(
            rendered.binds,
            vec![
                SqlParam::Int(7),
                SqlParam::Text("Ann".into()),
                SqlParam::Null
            ]
        );
    }

    #[test]
    fn stored_procedure_passes_variables_by_name() {
        let params: ParameterMap = [("id", Value::Int(1)), ("flag", Value::Bool(true))]
            .into_iter()
            .collect();
        let command = bound("dbo.GetUser", CommandKind::StoredProcedure, &params);
        let rendered = render_command(&command).unwrap();
        assert!(rendered.sql.ends_with("EXEC dbo.GetUser @id = @id, @flag = @flag;"));
    }

    #[test]
    fn stored_procedure_without_parameters() {
        let command = Command::new("GetUserCount", CommandKind::StoredProcedure);
        let rendered = render_command(&command).unwrap();
        assert_eq!(rendered.sql, "EXEC GetUserCount;");
    }

    #[test]
    fn table_rows_are_inlined_as_literals() {
        let rows = vec![
            [("a", Value::Int(1)), ("b", Value::Text("x".into()))]
                .into_iter()
                .collect::<RowMap>(),
            [("a", Value::Int(2)), ("b", Value::Text("it's".into()))]
                .into_iter()
                .collect::<RowMap>(),
        ];
        let params: ParameterMap = [(
            "rows",
            Value::Structured(StructuredValue::new("dbo.RowType", rows)),
        )]
        .into_iter()
        .collect();
        let command = bound("select * from @rows", CommandKind::Text, &params);
        let rendered = render_command(&command).unwrap();

        assert!(rendered.sql.contains("DECLARE @rows dbo.RowType;\n"));
        assert!(
            rendered
                .sql
                .contains("INSERT INTO @rows VALUES (1, N'x'), (2, N'it''s');\n")
        );
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn table_rows_fill_columns_by_position() {
        let rows = vec![
            [("Id", Value::Int(1)), ("Label", Value::Text("a".into()))]
                .into_iter()
                .collect::<RowMap>(),
        ];
        let params: ParameterMap = [(
            "@ids",
            Value::Structured(StructuredValue::new("dbo.IdList", rows)),
        )]
        .into_iter()
        .collect();
        let command = bound("select UserId from @ids", CommandKind::Text, &params);
        let rendered = render_command(&command).unwrap();

        assert!(rendered.sql.contains("INSERT INTO @ids VALUES (1, N'a');\n"));
        assert!(!rendered.sql.contains("Id]"));
        assert!(!rendered.sql.contains("Label"));
    }

    #[test]
    fn names_equal_without_at_sign_are_rejected() {
        for (first, second) in [("id", "@id"), ("@Id", "ID")] {
            let params: ParameterMap = [(first, Value::Int(1)), (second, Value::Int(2))]
                .into_iter()
                .collect();
            assert_eq!(params.len(), 2);
            let command = bound("select @id", CommandKind::Text, &params);
            assert!(matches!(
                render_command(&command),
                Err(SqlDispatchError::ParameterError(message)) if message.contains("more than once")
            ));
        }
    }

    #[test]
    fn empty_table_declares_without_insert() {
        let params: ParameterMap = [(
            "rows",
            Value::Structured(StructuredValue::new("dbo.RowType", Vec::new())),
        )]
        .into_iter()
        .collect();
        let command = bound("select * from @rows", CommandKind::Text, &params);
        let rendered = render_command(&command).unwrap();
        assert!(rendered.sql.contains("DECLARE @rows dbo.RowType;\n"));
        assert!(!rendered.sql.contains("INSERT"));
    }

    #[test]
    fn large_tables_are_chunked() {
        let rows = (0..2500)
            .map(|i| [("n", Value::Int(i))].into_iter().collect::<RowMap>())
            .collect();
        let params: ParameterMap = [("nums", Value::Structured(StructuredValue::new("dbo.Nums", rows)))]
            .into_iter()
            .collect();
        let command = bound("select count(*) from @nums", CommandKind::Text, &params);
        let rendered = render_command(&command).unwrap();
        assert_eq!(rendered.sql.matches("INSERT INTO @nums").count(), 3);
    }

    #[test]
    fn literal_forms() {
        let mut sql = String::new();
        push_literal(&mut sql, &Value::Bytes(vec![0x00, 0xFF])).unwrap();
        sql.push(' ');
        push_literal(&mut sql, &Value::Float(1.5)).unwrap();
        sql.push(' ');
        push_literal(&mut sql, &Value::Bool(false)).unwrap();
        assert_eq!(sql, "0x00FF 1.5e0 0");

        assert!(push_literal(&mut String::new(), &Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn rejects_unsafe_names() {
        assert!(variable_name("id; drop table users").is_err());
        assert!(variable_name("").is_err());
        assert!(variable_name("P1").is_err());
        assert!(variable_name("@p12").is_err());
        assert_eq!(variable_name("@Price").unwrap(), "Price");
        assert_eq!(variable_name("P").unwrap(), "P");
        assert!(check_type_name("dbo.T; drop table x").is_err());
        assert!(check_type_name("[dbo].[RowType]").is_ok());
    }
}
