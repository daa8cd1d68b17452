use crate::error::SqlDispatchError;
use crate::params::{Command, CommandKind};

const QUERY_PREFIX: &str = "select ";
const NON_QUERY_PREFIXES: [&str; 3] = ["insert ", "update ", "delete "];
const PROCEDURE_PREFIX: &str = "exec ";

/// How a compiled command is executed. Chosen once, at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// `select ...`: read every result set.
    Query,
    /// `insert`/`update`/`delete ...`: report rows affected.
    NonQuery,
    /// `exec <name>`: call the named stored procedure and read its result sets.
    StoredProcedure { procedure: String },
}

impl Strategy {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Query => "query",
            Strategy::NonQuery => "non_query",
            Strategy::StoredProcedure { .. } => "stored_procedure",
        }
    }
}

/// Pick the execution strategy from the command's leading keyword.
///
/// Matching is a case-insensitive prefix test on the text with leading
/// whitespace removed; the keyword must be followed by a space.
///
/// # Errors
/// Returns `SqlDispatchError::UnsupportedCommand` for any other leading keyword.
pub fn classify(source: &str) -> Result<Strategy, SqlDispatchError> {
    let command = source.trim_start();

    if has_prefix(command, QUERY_PREFIX) {
        Ok(Strategy::Query)
    } else if NON_QUERY_PREFIXES
        .iter()
        .any(|prefix| has_prefix(command, prefix))
    {
        Ok(Strategy::NonQuery)
    } else if has_prefix(command, PROCEDURE_PREFIX) {
        Ok(Strategy::StoredProcedure {
            procedure: command[PROCEDURE_PREFIX.len()..].trim_end().to_string(),
        })
    } else {
        let verb = command.split_whitespace().next().unwrap_or_default();
        Err(SqlDispatchError::UnsupportedCommand(verb.to_string()))
    }
}

fn has_prefix(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// The immutable result of compiling a command: its text, the connection
/// string it runs against, and the strategy bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command text with leading whitespace removed.
    pub text: String,
    /// Explicit or default connection string; checked at call time.
    pub connection_string: Option<String>,
    pub strategy: Strategy,
}

impl CommandDescriptor {
    /// Classify `source` and pair it with a connection string.
    ///
    /// # Errors
    /// Returns `SqlDispatchError::UnsupportedCommand` if `source` cannot be classified.
    pub fn new(source: &str, connection_string: Option<String>) -> Result<Self, SqlDispatchError> {
        let strategy = classify(source)?;
        Ok(Self {
            text: source.trim_start().to_string(),
            connection_string,
            strategy,
        })
    }

    /// A fresh, parameterless command for one call.
    #[must_use]
    pub fn command(&self) -> Command {
        match &self.strategy {
            Strategy::Query | Strategy::NonQuery => {
                Command::new(self.text.clone(), CommandKind::Text)
            }
            Strategy::StoredProcedure { procedure } => {
                Command::new(procedure.clone(), CommandKind::StoredProcedure)
            }
        }
    }
}
