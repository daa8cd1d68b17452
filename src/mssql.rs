//! SQL Server driver via Tiberius
//!
//! - config: connection string parsing
//! - client: raw client creation
//! - params: rendering bound parameters into tiberius queries
//! - query: result stream reading and cell conversion
//! - executor: the `Connector`/`Connection` implementations

pub mod client;
pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use client::create_mssql_client;
pub use config::{MssqlClient, parse_connection_string};
pub use executor::{MssqlConnection, MssqlConnector};
pub use params::{RenderedCommand, SqlParam, render_command};
pub use query::{MssqlReader, ReaderItem, StreamReader};
