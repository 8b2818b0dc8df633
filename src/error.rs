use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{operation} - at least one constraint is required")]
    EmptyConstraints { operation: &'static str },

    #[error("{operation} - An error occurred: {message}")]
    ExecutionError {
        operation: &'static str,
        message: String,
    },

    #[error("Could not read schema script {}: {source}", path.display())]
    ResourceReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Wrap a statement failure with the name of the Model operation that issued it.
    ///
    /// Construction, compile-time and resource failures pass through untouched so callers can
    /// still tell a bad table name apart from a failing statement.
    #[must_use]
    pub fn in_operation(self, operation: &'static str) -> Self {
        match self {
            err @ (ModelError::ConfigError(_)
            | ModelError::InvalidQuery(_)
            | ModelError::EmptyConstraints { .. }
            | ModelError::ResourceReadError { .. }) => err,
            other => ModelError::ExecutionError {
                operation,
                message: other.to_string(),
            },
        }
    }

    /// True when this is a wrapped statement failure.
    #[must_use]
    pub fn is_execution(&self) -> bool {
        matches!(self, ModelError::ExecutionError { .. })
    }
}

impl From<tokio::task::JoinError> for ModelError {
    fn from(err: tokio::task::JoinError) -> Self {
        ModelError::ConnectionError(format!("blocking worker failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_statement_failures_with_operation() {
        let err = ModelError::ConnectionError("pool timed out".into()).in_operation("select_one");
        assert!(err.is_execution());
        assert_eq!(
            err.to_string(),
            "select_one - An error occurred: Connection error: pool timed out"
        );
    }

    #[test]
    fn nested_wrapping_keeps_inner_context() {
        let err = ModelError::ParameterError("bad int".into())
            .in_operation("select_one")
            .in_operation("insert");
        assert_eq!(
            err.to_string(),
            "insert - An error occurred: select_one - An error occurred: Parameter conversion error: bad int"
        );
    }

    #[test]
    fn config_errors_are_not_rewrapped() {
        let err =
            ModelError::ConfigError("Table name must be defined".into()).in_operation("insert");
        assert!(matches!(err, ModelError::ConfigError(_)));
    }
}
