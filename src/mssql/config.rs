use tiberius::{Client, Config as TiberiusConfig};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use crate::error::SqlDispatchError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Parse an ADO.NET-style connection string
/// (`Server=tcp:host,1433;Database=db;User Id=sa;Password=...;TrustServerCertificate=true`).
///
/// # Errors
/// Returns `SqlDispatchError::ConfigError` if tiberius rejects the string.
pub fn parse_connection_string(connection_string: &str) -> Result<TiberiusConfig, SqlDispatchError> {
    TiberiusConfig::from_ado_string(connection_string).map_err(|e| {
        SqlDispatchError::ConfigError(format!("Invalid SQL Server connection string: {e}"))
    })
}
