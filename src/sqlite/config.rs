use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use bb8::{ManageConnection, Pool};
use rusqlite::Connection;

use crate::config::DatabaseConfig;
use crate::error::ModelError;
use crate::pool::supervisor::FatalReporter;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// bb8 manager for rusqlite connections to one database file.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: PathBuf,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode answers with a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = self.clone();
        async move {
            tracing::debug!(path = %manager.path.display(), "sqlite connect");
            manager.open()
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.query_row("SELECT 1", [], |_row| Ok(())) }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Build the `SQLite` pool described by `config`.
///
/// `:memory:` databases are private to each connection, so they get a pool of
/// one connection that is never recycled.
///
/// # Errors
/// Returns `ModelError::ConnectionError` if the first connection cannot be opened.
pub(crate) async fn build_pool(
    config: &DatabaseConfig,
    reporter: FatalReporter,
) -> Result<Pool<SqliteManager>, ModelError> {
    let path = config
        .sqlite_path()
        .ok_or_else(|| ModelError::ConfigError(format!("not a sqlite url: {}", config.url)))?;
    let in_memory = path == ":memory:";

    let mut builder = Pool::builder()
        .max_size(if in_memory { 1 } else { config.max_size })
        .connection_timeout(config.connection_timeout);
    if in_memory {
        // recycling the only connection would drop the database
        builder = builder.idle_timeout(None).max_lifetime(None);
    }

    let pool = builder
        .error_sink(Box::new(reporter))
        .build(SqliteManager::new(path))
        .await
        .map_err(|e| ModelError::ConnectionError(format!("Failed to create SQLite pool: {e}")))?;

    // smoke test so a bad path fails at startup rather than on first use
    pool.get()
        .await
        .map_err(|e| ModelError::ConnectionError(format!("sqlite checkout error: {e}")))?;

    Ok(pool)
}
