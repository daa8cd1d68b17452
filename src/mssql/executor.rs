use async_trait::async_trait;
use tracing::trace;

use super::client::create_mssql_client;
use super::config::MssqlClient;
use super::params::render_command;
use super::query::MssqlReader;
use crate::driver::{Connection, Connector, DataReader};
use crate::error::SqlDispatchError;
use crate::params::Command;

/// [`Connector`] for SQL Server over tiberius. Opens one TCP connection per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlConnector;

impl MssqlConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Box<dyn Connection>, SqlDispatchError> {
        let client = create_mssql_client(connection_string).await?;
        trace!("opened SQL Server connection");
        Ok(Box::new(MssqlConnection { client }))
    }
}

/// One open SQL Server connection.
pub struct MssqlConnection {
    client: MssqlClient,
}

impl MssqlConnection {
    #[must_use]
    pub fn new(client: MssqlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn execute_non_query(&mut self, command: &Command) -> Result<u64, SqlDispatchError> {
        let query = render_command(command)?.into_query();
        let result = query.execute(&mut self.client).await?;
        Ok(result.rows_affected().iter().sum())
    }

    async fn execute_reader<'a>(
        &'a mut self,
        command: &'a Command,
    ) -> Result<Box<dyn DataReader + 'a>, SqlDispatchError> {
        let query = render_command(command)?.into_query();
        let stream = query.query(&mut self.client).await?;
        Ok(Box::new(MssqlReader::from_query_stream(stream)))
    }

    async fn close(self: Box<Self>) -> Result<(), SqlDispatchError> {
        let MssqlConnection { client } = *self;
        client.close().await?;
        Ok(())
    }
}
