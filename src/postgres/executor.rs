use bb8::Pool;

use super::config::PgManager;
use super::params::Params;
use super::query::build_result_set_from_statement;
use crate::compiler::{Statement, StatementKind};
use crate::error::ModelError;
use crate::results::ResultSet;

/// Execute one compiled statement on a connection checked out for this call only.
///
/// # Errors
/// Returns `ModelError::ConnectionError` if checkout fails and the driver error otherwise.
pub async fn execute(
    pool: &Pool<PgManager>,
    statement: &Statement,
) -> Result<ResultSet, ModelError> {
    let client = pool
        .get()
        .await
        .map_err(|e| ModelError::ConnectionError(format!("postgres checkout error: {e}")))?;
    let params = Params::convert(&statement.params);

    match statement.kind {
        StatementKind::Query => {
            let prepared = client.prepare(&statement.sql).await?;
            let rows = client.query(&prepared, params.as_refs()).await?;
            build_result_set_from_statement(&prepared, &rows)
        }
        StatementKind::Execute => {
            let affected = client.execute(statement.sql.as_str(), params.as_refs()).await?;
            let affected = usize::try_from(affected).map_err(|e| {
                ModelError::ExecutionError {
                    operation: "execute",
                    message: format!("postgres affected rows conversion error: {e}"),
                }
            })?;
            Ok(ResultSet::affected(affected))
        }
    }
}

/// Execute a multi-statement script verbatim.
///
/// # Errors
/// Returns `ModelError::ConnectionError` if checkout fails and the driver error otherwise.
pub async fn execute_batch(pool: &Pool<PgManager>, script: &str) -> Result<(), ModelError> {
    let client = pool
        .get()
        .await
        .map_err(|e| ModelError::ConnectionError(format!("postgres checkout error: {e}")))?;
    client.batch_execute(script).await?;
    Ok(())
}
