use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use futures_util::stream::{BoxStream, Stream};
use futures_util::{StreamExt, TryStreamExt};
use tiberius::{Column, ColumnData, ColumnType, FromSql, QueryItem, QueryStream};

use crate::driver::{ColumnMeta, DataReader, SqlValue};
use crate::error::SqlDispatchError;

/// One item of a flattened multi-result-set stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderItem {
    /// Start of a result set. Column-less metadata carries no result set.
    Columns(Vec<ColumnMeta>),
    Row(Vec<SqlValue>),
}

/// [`DataReader`] over a flat stream of metadata and row items.
///
/// Metadata met while reading rows ends the current result set and is held
/// until the next call to `next_result`.
pub struct StreamReader<S> {
    items: S,
    pending: Option<Vec<ColumnMeta>>,
    done: bool,
}

/// Reader over a tiberius query stream.
pub type MssqlReader<'a> = StreamReader<BoxStream<'a, Result<ReaderItem, SqlDispatchError>>>;

impl<S> StreamReader<S> {
    #[must_use]
    pub fn new(items: S) -> Self {
        Self {
            items,
            pending: None,
            done: false,
        }
    }
}

impl<'a> MssqlReader<'a> {
    #[must_use]
    pub fn from_query_stream(stream: QueryStream<'a>) -> Self {
        StreamReader::new(stream.map(reader_item).boxed())
    }
}

fn reader_item(
    item: Result<QueryItem, tiberius::error::Error>,
) -> Result<ReaderItem, SqlDispatchError> {
    match item? {
        QueryItem::Metadata(meta) => Ok(ReaderItem::Columns(column_metas(meta.columns()))),
        QueryItem::Row(row) => row
            .into_iter()
            .map(|data| convert_cell(&data))
            .collect::<Result<Vec<_>, _>>()
            .map(ReaderItem::Row),
    }
}

impl<S> StreamReader<S>
where
    S: Stream<Item = Result<ReaderItem, SqlDispatchError>> + Unpin + Send,
{
    async fn next_item(&mut self) -> Result<Option<ReaderItem>, SqlDispatchError> {
        if self.done {
            return Ok(None);
        }
        let item = self.items.try_next().await?;
        if item.is_none() {
            self.done = true;
        }
        Ok(item)
    }
}

#[async_trait]
impl<S> DataReader for StreamReader<S>
where
    S: Stream<Item = Result<ReaderItem, SqlDispatchError>> + Unpin + Send,
{
    async fn next_result(&mut self) -> Result<Option<Vec<ColumnMeta>>, SqlDispatchError> {
        if let Some(columns) = self.pending.take() {
            return Ok(Some(columns));
        }
        loop {
            match self.next_item().await? {
                Some(ReaderItem::Columns(columns)) if !columns.is_empty() => {
                    return Ok(Some(columns));
                }
                // Unread rows of the current set, or column-less metadata.
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, SqlDispatchError> {
        if self.pending.is_some() {
            return Ok(None);
        }
        loop {
            match self.next_item().await? {
                Some(ReaderItem::Row(values)) => return Ok(Some(values)),
                Some(ReaderItem::Columns(columns)) => {
                    if !columns.is_empty() {
                        self.pending = Some(columns);
                        return Ok(None);
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

fn column_metas(columns: &[Column]) -> Vec<ColumnMeta> {
    columns
        .iter()
        .map(|col| ColumnMeta::new(col.name(), native_type_name(col.column_type())))
        .collect()
}

/// Engine type name for a TDS column type. Nullable (`...n`) variants carry
/// no width, so they report the widest common name.
#[must_use]
#[allow(unreachable_patterns)]
pub fn native_type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Bit | ColumnType::Bitn => "bit",
        ColumnType::Int1 => "tinyint",
        ColumnType::Int2 => "smallint",
        ColumnType::Int4 | ColumnType::Intn => "int",
        ColumnType::Int8 => "bigint",
        ColumnType::Float4 => "real",
        ColumnType::Float8 | ColumnType::Floatn => "float",
        ColumnType::Money => "money",
        ColumnType::Money4 => "smallmoney",
        ColumnType::Decimaln | ColumnType::Numericn => "decimal",
        ColumnType::Datetime | ColumnType::Datetimen => "datetime",
        ColumnType::Datetime4 => "smalldatetime",
        ColumnType::Datetime2 => "datetime2",
        ColumnType::Daten => "date",
        ColumnType::Timen => "time",
        ColumnType::DatetimeOffsetn => "datetimeoffset",
        ColumnType::Guid => "uniqueidentifier",
        ColumnType::BigVarBin => "varbinary",
        ColumnType::BigBinary => "binary",
        ColumnType::Image => "image",
        ColumnType::BigVarChar => "varchar",
        ColumnType::BigChar => "char",
        ColumnType::NVarchar => "nvarchar",
        ColumnType::NChar => "nchar",
        ColumnType::Text => "text",
        ColumnType::NText => "ntext",
        ColumnType::Xml => "xml",
        ColumnType::Udt => "udt",
        ColumnType::SSVariant | ColumnType::Null => "sql_variant",
        _ => "sql_variant",
    }
}

/// Convert one tiberius cell into an owned native value.
///
/// # Errors
/// Returns `SqlDispatchError::MssqlError` if a temporal value cannot be decoded.
pub fn convert_cell(data: &ColumnData<'static>) -> Result<SqlValue, SqlDispatchError> {
    let value = match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, SqlValue::TinyInt),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, SqlValue::SmallInt),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::BigInt),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, SqlValue::Real),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bit),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, SqlValue::Guid),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |bytes| SqlValue::Binary(bytes.to_vec())),
        ColumnData::Numeric(v) => v.as_ref().map_or(SqlValue::Null, |n| {
            SqlValue::Decimal(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }),
        ColumnData::Xml(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |xml| SqlValue::Xml(xml.to_string())),
        ColumnData::DateTime(_) => NaiveDateTime::from_sql(data)?
            .map_or(SqlValue::Null, |ts| SqlValue::DateTime(round_to_millis(ts))),
        ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map_or(SqlValue::Null, SqlValue::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.map_or(SqlValue::Null, SqlValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.map_or(SqlValue::Null, SqlValue::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?
            .map_or(SqlValue::Null, SqlValue::DateTimeOffset),
    };
    Ok(value)
}

/// `datetime` stores 1/300 s ticks; the server presents them rounded to the millisecond.
fn round_to_millis(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = i64::from(ts.nanosecond());
    let millis = (nanos + 500_000) / 1_000_000;
    ts.checked_sub_signed(TimeDelta::nanoseconds(nanos))
        .and_then(|whole| whole.checked_add_signed(TimeDelta::milliseconds(millis)))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::format_timestamp;
    use std::borrow::Cow;
    use tiberius::Uuid;

    #[test]
    fn converts_scalars() {
        assert_eq!(convert_cell(&ColumnData::I32(Some(7))).unwrap(), SqlValue::Int(7));
        assert_eq!(convert_cell(&ColumnData::I32(None)).unwrap(), SqlValue::Null);
        assert_eq!(
            convert_cell(&ColumnData::String(Some(Cow::Borrowed("Ann")))).unwrap(),
            SqlValue::Text("Ann".into())
        );
        assert_eq!(
            convert_cell(&ColumnData::Binary(Some(Cow::Owned(vec![0x00, 0xFF])))).unwrap(),
            SqlValue::Binary(vec![0x00, 0xFF])
        );
        assert_eq!(
            convert_cell(&ColumnData::Guid(Some(Uuid::nil()))).unwrap(),
            SqlValue::Guid(Uuid::nil())
        );
    }

    #[test]
    fn maps_wire_types_to_engine_names() {
        assert_eq!(native_type_name(ColumnType::Intn), "int");
        assert_eq!(native_type_name(ColumnType::BigVarBin), "varbinary");
        assert_eq!(native_type_name(ColumnType::Daten), "date");
        assert_eq!(native_type_name(ColumnType::DatetimeOffsetn), "datetimeoffset");
        assert_eq!(native_type_name(ColumnType::Datetime4), "smalldatetime");
    }

    fn datetime_cell(fragments: u32) -> String {
        let days = (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            - NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
        .num_days();
        let cell = ColumnData::DateTime(Some(tiberius::time::DateTime::new(
            i32::try_from(days).unwrap(),
            fragments,
        )));
        match convert_cell(&cell).unwrap() {
            SqlValue::DateTime(ts) => format_timestamp(ts),
            other => panic!("expected a timestamp, got {other:?}"),
        }
    }

    #[test]
    fn legacy_datetime_rounds_to_milliseconds() {
        assert_eq!(datetime_cell(0), "2024-01-01T00:00:00.0000000");
        assert_eq!(datetime_cell(1), "2024-01-01T00:00:00.0030000");
        assert_eq!(datetime_cell(2), "2024-01-01T00:00:00.0070000");
        assert_eq!(datetime_cell(299), "2024-01-01T00:00:00.9970000");
        // 12:00:00.500
        assert_eq!(datetime_cell(12 * 3600 * 300 + 150), "2024-01-01T12:00:00.5000000");
    }

    fn columns(names: &[&str]) -> ReaderItem {
        ReaderItem::Columns(names.iter().map(|n| ColumnMeta::new(*n, "int")).collect())
    }

    fn row(value: i32) -> ReaderItem {
        ReaderItem::Row(vec![SqlValue::Int(value)])
    }

    fn reader(
        items: Vec<ReaderItem>,
    ) -> StreamReader<impl Stream<Item = Result<ReaderItem, SqlDispatchError>> + Unpin + Send>
    {
        StreamReader::new(futures_util::stream::iter(items.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn metadata_during_rows_starts_the_next_result_set() {
        let mut reader = reader(vec![
            columns(&["a"]),
            row(1),
            row(2),
            columns(&["b"]),
            row(3),
        ]);

        assert_eq!(reader.next_result().await.unwrap().unwrap()[0].name, "a");
        assert_eq!(reader.next_row().await.unwrap(), Some(vec![SqlValue::Int(1)]));
        assert_eq!(reader.next_row().await.unwrap(), Some(vec![SqlValue::Int(2)]));
        assert_eq!(reader.next_row().await.unwrap(), None);
        // The set is over until the held metadata is taken.
        assert_eq!(reader.next_row().await.unwrap(), None);

        assert_eq!(reader.next_result().await.unwrap().unwrap()[0].name, "b");
        assert_eq!(reader.next_row().await.unwrap(), Some(vec![SqlValue::Int(3)]));
        assert_eq!(reader.next_row().await.unwrap(), None);
        assert_eq!(reader.next_result().await.unwrap(), None);
        assert_eq!(reader.next_result().await.unwrap(), None);
    }

    #[tokio::test]
    async fn next_result_skips_unread_rows_and_empty_metadata() {
        let mut reader = reader(vec![
            columns(&[]),
            columns(&["a"]),
            row(1),
            row(2),
            columns(&[]),
            columns(&["b"]),
        ]);

        assert_eq!(reader.next_result().await.unwrap().unwrap()[0].name, "a");
        assert_eq!(reader.next_result().await.unwrap().unwrap()[0].name, "b");
        assert_eq!(reader.next_row().await.unwrap(), None);
        assert_eq!(reader.next_result().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_sets_survive_materialization() {
        let reader = reader(vec![columns(&["a"]), row(1), columns(&["b"]), columns(&["c"])]);
        let result = crate::results::materialize(Box::new(reader)).await.unwrap();
        assert_eq!(result.result_set_count(), 3);
        assert_eq!(
            result.into_json(),
            serde_json::json!([[{"a": 1}], [], []])
        );
    }

    #[tokio::test]
    async fn stream_errors_are_passed_through() {
        let items = vec![
            Ok(columns(&["a"])),
            Err(SqlDispatchError::ExecutionError("lost".into())),
        ];
        let mut reader = StreamReader::new(futures_util::stream::iter(items));
        assert!(reader.next_result().await.unwrap().is_some());
        assert!(matches!(
            reader.next_row().await,
            Err(SqlDispatchError::ExecutionError(message)) if message == "lost"
        ));
    }
}
