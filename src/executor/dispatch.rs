use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::{CompileOptions, DispatcherBuilder};
use crate::driver::{Connection, Connector};
use crate::error::SqlDispatchError;
use crate::params::{Command, bind_parameters};
use crate::results::{ResultValue, materialize};
use crate::types::ParameterMap;

use super::strategy::{CommandDescriptor, Strategy};

/// What a compiled command returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    /// Non-query commands: number of rows affected.
    RowsAffected(u64),
    /// Query and stored-procedure commands.
    Rows(ResultValue),
}

impl CommandOutput {
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        if let CommandOutput::RowsAffected(count) = self {
            Some(*count)
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<ResultValue> {
        if let CommandOutput::Rows(rows) = self {
            Some(rows)
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            CommandOutput::RowsAffected(count) => JsonValue::from(count),
            CommandOutput::Rows(rows) => rows.into_json(),
        }
    }
}

/// Single-argument async callable produced by [`Dispatcher::compile_func`].
pub type CompiledFunc = Arc<
    dyn Fn(Option<ParameterMap>) -> BoxFuture<'static, Result<CommandOutput, SqlDispatchError>>
        + Send
        + Sync,
>;

/// Compiles command text into reusable [`CompiledCommand`]s.
///
/// ```rust,no_run
/// use sql_dispatch::prelude::*;
///
/// # async fn demo() -> Result<(), SqlDispatchError> {
/// let dispatcher = Dispatcher::builder_mssql()
///     .default_connection_string_from_env()
///     .finish();
/// let select = dispatcher.compile(CompileOptions::new(
///     "select id, name from users where id = @id",
/// ))?;
///
/// let mut params = ParameterMap::new();
/// params.insert("id", 7);
/// let rows = select.execute(Some(&params)).await?.into_json();
/// # let _ = rows;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
    default_connection_string: Option<String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "default_connection_string",
                &self.default_connection_string.as_ref().map(|_| "<set>"),
            )
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// `default_connection_string` is used by every command compiled without
    /// an explicit `connectionString`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, default_connection_string: Option<String>) -> Self {
        Self {
            connector,
            default_connection_string,
        }
    }

    #[must_use]
    pub fn builder(connector: Arc<dyn Connector>) -> DispatcherBuilder {
        DispatcherBuilder::new(connector)
    }

    #[must_use]
    pub fn builder_mssql() -> DispatcherBuilder {
        DispatcherBuilder::mssql()
    }

    /// Classify the command and bind it to a connection string.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::UnsupportedCommand` if the leading keyword is not
    /// select, insert, update, delete, or exec.
    pub fn compile(&self, options: CompileOptions) -> Result<CompiledCommand, SqlDispatchError> {
        let connection_string = options
            .connection_string
            .or_else(|| self.default_connection_string.clone());
        let descriptor = CommandDescriptor::new(&options.source, connection_string)?;
        debug!(strategy = descriptor.strategy.name(), "compiled command");
        Ok(CompiledCommand {
            descriptor: Arc::new(descriptor),
            connector: Arc::clone(&self.connector),
        })
    }

    /// Compile from a host configuration map (`source`, optional `connectionString`).
    ///
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` for a malformed map, or
    /// `SqlDispatchError::UnsupportedCommand` as [`Dispatcher::compile`] does.
    pub fn compile_json(&self, config: JsonValue) -> Result<CompiledCommand, SqlDispatchError> {
        self.compile(CompileOptions::from_json(config)?)
    }

    /// Compile straight to a callable.
    ///
    /// # Errors
    /// Same as [`Dispatcher::compile`].
    pub fn compile_func(&self, options: CompileOptions) -> Result<CompiledFunc, SqlDispatchError> {
        self.compile(options).map(CompiledCommand::into_func)
    }
}

/// A compiled command. Cheap to clone; every call opens its own connection.
#[derive(Clone)]
pub struct CompiledCommand {
    descriptor: Arc<CommandDescriptor>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for CompiledCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCommand")
            .field("text", &self.descriptor.text)
            .field("strategy", &self.descriptor.strategy)
            .finish_non_exhaustive()
    }
}

impl CompiledCommand {
    #[must_use]
    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.descriptor.strategy
    }

    /// Run the command once with the given parameters.
    ///
    /// Opens a connection, executes exactly once, and releases the connection on
    /// every path. Nothing is retried and no partial result is returned.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::MissingConnectionString` if no connection string was
    /// resolved at compile time, `SqlDispatchError::UnrecognizedNativeType` for an
    /// unmapped result column, or the driver's error unchanged.
    pub async fn execute(
        &self,
        parameters: Option<&ParameterMap>,
    ) -> Result<CommandOutput, SqlDispatchError> {
        let descriptor = &*self.descriptor;
        let connection_string = descriptor
            .connection_string
            .as_deref()
            .ok_or(SqlDispatchError::MissingConnectionString)?;

        let mut command = descriptor.command();
        bind_parameters(&mut command, parameters);
        debug!(
            strategy = descriptor.strategy.name(),
            parameters = command.parameters.len(),
            "executing command"
        );

        let mut connection = self.connector.connect(connection_string).await?;
        let output = match descriptor.strategy {
            Strategy::NonQuery => {
                let affected = connection.execute_non_query(&command).await?;
                debug!(rows_affected = affected, "non-query finished");
                CommandOutput::RowsAffected(affected)
            }
            Strategy::Query | Strategy::StoredProcedure { .. } => {
                let rows = read_all(connection.as_mut(), &command).await?;
                debug!(result_sets = rows.result_set_count(), "query finished");
                CommandOutput::Rows(rows)
            }
        };

        if let Err(e) = connection.close().await {
            warn!(error = %e, "closing connection failed after a successful call");
        }
        Ok(output)
    }

    /// Wrap this command in a single-argument callable.
    #[must_use]
    pub fn into_func(self) -> CompiledFunc {
        Arc::new(move |parameters: Option<ParameterMap>| {
            let command = self.clone();
            async move { command.execute(parameters.as_ref()).await }.boxed()
        })
    }
}

async fn read_all(
    connection: &mut dyn Connection,
    command: &Command,
) -> Result<ResultValue, SqlDispatchError> {
    let reader = connection.execute_reader(command).await?;
    materialize(reader).await
}
