use bb8::Pool;
use rusqlite::Connection;

use super::config::SqliteManager;
use super::params::Params;
use super::query::build_result_set;
use crate::compiler::{Statement, StatementKind};
use crate::error::ModelError;
use crate::results::ResultSet;

fn run_statement(conn: &Connection, statement: &Statement) -> Result<ResultSet, ModelError> {
    let params = Params::convert(&statement.params);
    let mut stmt = conn.prepare(&statement.sql)?;
    match statement.kind {
        StatementKind::Query => build_result_set(&mut stmt, params.as_values()),
        StatementKind::Execute => {
            let affected = stmt.execute(rusqlite::params_from_iter(params.as_values()))?;
            Ok(ResultSet::affected(affected))
        }
    }
}

/// Execute one compiled statement. The checked-out connection moves onto the
/// blocking pool and goes back to bb8 when the work is done.
///
/// # Errors
/// Returns `ModelError::ConnectionError` if checkout fails and the driver error otherwise.
pub async fn execute(
    pool: &Pool<SqliteManager>,
    statement: &Statement,
) -> Result<ResultSet, ModelError> {
    let conn = pool
        .get_owned()
        .await
        .map_err(|e| ModelError::ConnectionError(format!("sqlite checkout error: {e}")))?;
    let statement = statement.clone();
    tokio::task::spawn_blocking(move || run_statement(&conn, &statement)).await?
}

/// Execute a multi-statement script verbatim.
///
/// # Errors
/// Returns `ModelError::ConnectionError` if checkout fails and the driver error otherwise.
pub async fn execute_batch(pool: &Pool<SqliteManager>, script: &str) -> Result<(), ModelError> {
    let conn = pool
        .get_owned()
        .await
        .map_err(|e| ModelError::ConnectionError(format!("sqlite checkout error: {e}")))?;
    let script = script.to_owned();
    tokio::task::spawn_blocking(move || conn.execute_batch(&script).map_err(ModelError::from))
        .await?
}
