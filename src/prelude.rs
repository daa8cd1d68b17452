//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{CompileOptions, DEFAULT_CONNECTION_STRING_ENV, DispatcherBuilder};
pub use crate::driver::{ColumnMeta, Connection, Connector, DataReader, SqlValue};
pub use crate::error::SqlDispatchError;
pub use crate::executor::{
    CommandDescriptor, CommandOutput, CompiledCommand, CompiledFunc, Dispatcher, Strategy,
};
pub use crate::mssql::MssqlConnector;
pub use crate::params::{BoundParameter, BoundValue, Command, CommandKind, TableParameter};
pub use crate::results::{ResultValue, Row};
pub use crate::type_map::{SqlDbType, ValueKind};
pub use crate::types::{ParameterMap, RowMap, StructuredValue, Value, parameters_from_json};
