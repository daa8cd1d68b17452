use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde_json::{Map, Number, Value as JsonValue};

use crate::driver::{ColumnMeta, SqlValue};
use crate::error::SqlDispatchError;
use crate::type_map::{ValueKind, value_kind_for_type_name};

/// One materialized row: column name → JSON value, in column order.
pub type Row = Map<String, JsonValue>;

/// Placeholder emitted for nested cursor columns.
pub const READER_PLACEHOLDER: &str = "<IDataReader>";

/// A result column with its declared kind resolved once per result set.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub name: String,
    /// Lower-cased native type name.
    pub type_name: String,
    pub kind: ValueKind,
}

impl ResolvedColumn {
    /// Resolve the declared kind of a column from its native type name.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::UnrecognizedNativeType` for unmapped native types.
    pub fn resolve(meta: &ColumnMeta) -> Result<Self, SqlDispatchError> {
        Ok(Self {
            name: meta.name.clone(),
            type_name: meta.type_name.trim().to_ascii_lowercase(),
            kind: value_kind_for_type_name(&meta.type_name)?,
        })
    }
}

/// Build a row from resolved columns and the cells read for them.
///
/// Duplicate column names keep the last value.
#[must_use]
pub fn build_row(columns: &[ResolvedColumn], values: Vec<SqlValue>) -> Row {
    let mut row = Row::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(values) {
        row.insert(column.name.clone(), normalize(column, value));
    }
    row
}

/// Normalize one cell; the first matching rule wins.
#[must_use]
pub fn normalize(column: &ResolvedColumn, value: SqlValue) -> JsonValue {
    if matches!(value, SqlValue::Null) {
        return JsonValue::Null;
    }

    if column.kind == ValueKind::Binary {
        if let SqlValue::Binary(bytes) = &value {
            return JsonValue::String(BASE64.encode(bytes));
        }
    }

    match column.type_name.as_str() {
        "time" => {
            if let Some(time) = time_of_day(&value) {
                return JsonValue::String(format_time(time));
            }
        }
        "date" => {
            if let Some(ts) = timestamp(&value) {
                return JsonValue::String(ts.format("%Y-%m-%d").to_string());
            }
        }
        // The offset is dropped: only the local wall-clock part is rendered.
        "datetimeoffset" | "datetime" | "datetime2" | "smalldatetime" => {
            if let Some(ts) = timestamp(&value) {
                return JsonValue::String(format_timestamp(ts));
            }
        }
        _ => {}
    }

    match column.kind {
        ValueKind::DateTime | ValueKind::DateTimeOffset => {
            if let Some(ts) = timestamp(&value) {
                return JsonValue::String(format_timestamp(ts));
            }
        }
        ValueKind::Uuid => {
            if let SqlValue::Guid(guid) = &value {
                return JsonValue::String(guid.to_string());
            }
        }
        ValueKind::Reader => return JsonValue::String(READER_PLACEHOLDER.to_string()),
        _ => {}
    }

    passthrough(value)
}

/// `yyyy-MM-ddTHH:mm:ss.fffffff`
#[must_use]
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    format!(
        "{}.{:07}",
        ts.format("%Y-%m-%dT%H:%M:%S"),
        hundred_nanos(ts.nanosecond())
    )
}

/// `HH:mm:ss.fffffff`
#[must_use]
pub fn format_time(time: NaiveTime) -> String {
    format!(
        "{}.{:07}",
        time.format("%H:%M:%S"),
        hundred_nanos(time.nanosecond())
    )
}

// chrono encodes a leap second as nanosecond >= 1_000_000_000.
fn hundred_nanos(nanos: u32) -> u32 {
    (nanos % 1_000_000_000) / 100
}

fn timestamp(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::DateTime(ts) => Some(*ts),
        SqlValue::Date(date) => Some(date.and_time(NaiveTime::MIN)),
        SqlValue::DateTimeOffset(ts) => Some(ts.naive_local()),
        _ => None,
    }
}

fn time_of_day(value: &SqlValue) -> Option<NaiveTime> {
    match value {
        SqlValue::Time(time) => Some(*time),
        SqlValue::DateTime(ts) => Some(ts.time()),
        SqlValue::DateTimeOffset(ts) => Some(ts.naive_local().time()),
        _ => None,
    }
}

fn passthrough(value: SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bit(b) => JsonValue::Bool(b),
        SqlValue::TinyInt(i) => JsonValue::from(i),
        SqlValue::SmallInt(i) => JsonValue::from(i),
        SqlValue::Int(i) => JsonValue::from(i),
        SqlValue::BigInt(i) => JsonValue::from(i),
        SqlValue::Real(f) => float(f64::from(f)),
        SqlValue::Float(f) | SqlValue::Decimal(f) => float(f),
        SqlValue::Text(s) | SqlValue::Xml(s) => JsonValue::String(s),
        SqlValue::Binary(bytes) => JsonValue::String(BASE64.encode(bytes)),
        SqlValue::Guid(guid) => JsonValue::String(guid.to_string()),
        SqlValue::Date(date) => JsonValue::String(date.format("%Y-%m-%d").to_string()),
        SqlValue::Time(time) => JsonValue::String(format_time(time)),
        SqlValue::DateTime(ts) => JsonValue::String(format_timestamp(ts)),
        SqlValue::DateTimeOffset(ts) => JsonValue::String(format_timestamp(ts.naive_local())),
        SqlValue::Reader => JsonValue::String(READER_PLACEHOLDER.to_string()),
    }
}

// NaN and infinities have no JSON form.
fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}
