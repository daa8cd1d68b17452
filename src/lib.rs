//! Compile raw SQL Server command text into reusable async callables.
//!
//! A [`Dispatcher`](executor::Dispatcher) classifies a command by its leading
//! keyword (`select`, `insert`/`update`/`delete`, `exec`) and returns a
//! [`CompiledCommand`](executor::CompiledCommand). Each call binds a generic
//! [`ParameterMap`](types::ParameterMap), including table-valued parameters,
//! opens a fresh connection, executes once, and returns either a rows-affected
//! count or the rows of every result set as JSON-shaped maps.

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mssql;
pub mod params;
pub mod prelude;
pub mod results;
pub mod type_map;
pub mod types;

pub use error::SqlDispatchError;
