//! The seam between the dispatcher and a concrete database driver.
//!
//! A [`Connector`] opens one [`Connection`] per call. A connection executes a
//! bound [`Command`] either as a non-query (rows affected) or as a reader that
//! walks result sets one row at a time.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::Uuid;

use crate::error::SqlDispatchError;
use crate::params::Command;

/// Name and native type name of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// The engine's type name, e.g. `int`, `datetime2`, `varbinary`.
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// An owned cell as the driver read it off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bit(bool),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Float(f64),
    Decimal(f64),
    Text(String),
    Xml(String),
    Binary(Vec<u8>),
    Guid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    /// A nested cursor; only ever rendered as a placeholder.
    Reader,
}

/// Opens connections from a connection string.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh connection.
    ///
    /// # Errors
    /// Returns a driver error if the connection string is invalid or the server is unreachable.
    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn Connection>, SqlDispatchError>;
}

/// One open connection, owned by a single call.
#[async_trait]
pub trait Connection: Send {
    /// Execute a command that returns no rows and report how many rows it touched.
    async fn execute_non_query(&mut self, command: &Command) -> Result<u64, SqlDispatchError>;

    /// Execute a command and hand back a reader over its result sets.
    async fn execute_reader<'a>(
        &'a mut self,
        command: &'a Command,
    ) -> Result<Box<dyn DataReader + 'a>, SqlDispatchError>;

    /// Close the connection gracefully. Dropping it without closing also releases it.
    async fn close(self: Box<Self>) -> Result<(), SqlDispatchError>;
}

/// Single-pass cursor over one or more result sets.
#[async_trait]
pub trait DataReader: Send {
    /// Advance to the next result set and return its columns, or `None` when
    /// there are no more. Rows left unread in the current set are skipped.
    async fn next_result(&mut self) -> Result<Option<Vec<ColumnMeta>>, SqlDispatchError>;

    /// Next row of the current result set, or `None` at its end.
    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, SqlDispatchError>;
}
