use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::debug;

use super::config::{MssqlClient, parse_connection_string};
use crate::error::SqlDispatchError;

/// Open a new SQL Server connection from a connection string.
///
/// Named instances are resolved through SQL Browser. A routing redirect
/// (Azure SQL gateways) is followed once.
///
/// # Errors
/// Returns `SqlDispatchError::ConfigError` for an invalid connection string and
/// `SqlDispatchError::MssqlError` if connecting or logging in fails.
pub async fn create_mssql_client(connection_string: &str) -> Result<MssqlClient, SqlDispatchError> {
    let mut config = parse_connection_string(connection_string)?;

    let tcp = TcpStream::connect_named(&config).await?;
    tcp.set_nodelay(true).map_err(|e| {
        SqlDispatchError::ConnectionError(format!("Failed to set TCP_NODELAY: {e}"))
    })?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!(%host, port, "following SQL Server routing redirect");
            config.host(&host);
            config.port(port);

            let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
                SqlDispatchError::ConnectionError(format!("TCP connection error: {e}"))
            })?;
            tcp.set_nodelay(true).map_err(|e| {
                SqlDispatchError::ConnectionError(format!("Failed to set TCP_NODELAY: {e}"))
            })?;
            Ok(Client::connect(config, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}
