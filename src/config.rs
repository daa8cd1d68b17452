use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::driver::Connector;
use crate::error::SqlDispatchError;
use crate::executor::Dispatcher;
use crate::mssql::MssqlConnector;

/// Environment variable holding the default connection string.
pub const DEFAULT_CONNECTION_STRING_ENV: &str = "EDGE_SQL_CONNECTION_STRING";

/// Compile-time configuration for one command.
///
/// Deserializes from the host's configuration map; keys other than `source`
/// and `connectionString` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompileOptions {
    /// The SQL text to compile.
    pub source: String,
    /// Overrides the dispatcher's default connection string.
    #[serde(rename = "connectionString", default)]
    pub connection_string: Option<String>,
}

impl CompileOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            connection_string: None,
        }
    }

    #[must_use]
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Read options from a host configuration map.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::ConfigError` if `source` is missing or any
    /// recognized key has the wrong type.
    pub fn from_json(config: JsonValue) -> Result<Self, SqlDispatchError> {
        serde_json::from_value(config)
            .map_err(|e| SqlDispatchError::ConfigError(format!("invalid compile options: {e}")))
    }
}

/// Fluent builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    connector: Arc<dyn Connector>,
    default_connection_string: Option<String>,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            default_connection_string: None,
        }
    }

    /// Builder over the SQL Server driver.
    #[must_use]
    pub fn mssql() -> Self {
        Self::new(Arc::new(MssqlConnector::new()))
    }

    #[must_use]
    pub fn default_connection_string(mut self, connection_string: Option<String>) -> Self {
        self.default_connection_string = connection_string;
        self
    }

    /// Take the default connection string from `EDGE_SQL_CONNECTION_STRING`, read now.
    #[must_use]
    pub fn default_connection_string_from_env(self) -> Self {
        let from_env = std::env::var(DEFAULT_CONNECTION_STRING_ENV).ok();
        self.default_connection_string(from_env)
    }

    #[must_use]
    pub fn finish(self) -> Dispatcher {
        Dispatcher::new(self.connector, self.default_connection_string)
    }
}
