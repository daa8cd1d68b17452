use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlDispatchError {
    #[error(
        "Unsupported type of SQL command: {0:?}. Only select, insert, update, delete, and exec are supported."
    )]
    UnsupportedCommand(String),

    #[error("No connection string: pass `connectionString` or set a default connection string")]
    MissingConnectionString,

    #[error("Unrecognized native type: {0}")]
    UnrecognizedNativeType(String),

    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqlDispatchError {
    /// True for failures reported by the database driver rather than by this crate.
    #[must_use]
    pub fn is_driver_failure(&self) -> bool {
        matches!(
            self,
            Self::MssqlError(_) | Self::ConnectionError(_) | Self::ExecutionError(_)
        )
    }
}
