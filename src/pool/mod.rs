pub mod supervisor;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bb8::Pool;

pub use supervisor::{PoolFatalError, PoolSupervisor};

use crate::compiler::{PlaceholderStyle, SqlCompiler, Statement};
use crate::config::DatabaseConfig;
use crate::error::ModelError;
#[cfg(feature = "postgres")]
use crate::postgres::{self, PgManager};
use crate::results::ResultSet;
#[cfg(feature = "sqlite")]
use crate::sqlite::{self, SqliteManager};
use crate::types::DatabaseType;

#[derive(Clone)]
enum Backend {
    #[cfg(feature = "postgres")]
    Postgres(Pool<PgManager>),
    #[cfg(feature = "sqlite")]
    Sqlite(Pool<SqliteManager>),
}

/// Connection counts reported by bb8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Shared handle to the process's connection pool.
///
/// Cloning is cheap; every [`Model`](crate::model::Model) borrows a clone.
/// Each `execute` checks a connection out for that single statement only.
#[derive(Clone)]
pub struct ConnectionPool {
    backend: Backend,
    db_type: DatabaseType,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("db_type", &self.db_type)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Build the pool and the supervisor that receives its fatal errors.
    ///
    /// Dropping the supervisor keeps the fail-fast default, where an
    /// out-of-band pool failure exits the process.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` for an unusable configuration and
    /// `ModelError::ConnectionError` if the pool cannot start.
    pub async fn connect(
        config: &DatabaseConfig,
    ) -> Result<(ConnectionPool, PoolSupervisor), ModelError> {
        let db_type = config.database_type()?;
        tracing::info!(
            url = %config.redacted_url(),
            ssl = config.ssl,
            max_size = config.max_size,
            ?db_type,
            "initialising connection pool"
        );
        let (reporter, supervisor) = supervisor::channel(db_type);

        let backend = match db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                Backend::Postgres(postgres::config::build_pool(config, reporter).await?)
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                Backend::Sqlite(sqlite::config::build_pool(config, reporter).await?)
            }
        };

        let pool = ConnectionPool {
            backend,
            db_type,
            closed: Arc::new(AtomicBool::new(false)),
        };
        Ok((pool, supervisor))
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// How this backend spells bound parameters.
    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(_) => PlaceholderStyle::Postgres,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => PlaceholderStyle::Sqlite,
        }
    }

    /// A compiler that emits SQL for this backend.
    #[must_use]
    pub fn compiler(&self) -> SqlCompiler {
        SqlCompiler::new(self.placeholder_style())
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(pool) => pool.state(),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => pool.state(),
        };
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Execute one statement and log it along with the first row returned.
    ///
    /// # Errors
    /// Returns `ModelError::ConnectionError` after [`close`](Self::close) or when
    /// checkout fails, and the driver error when the statement fails.
    pub async fn execute(&self, statement: &Statement) -> Result<ResultSet, ModelError> {
        self.ensure_open()?;
        let result = match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(pool) => postgres::execute(pool, statement).await,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => sqlite::execute(pool, statement).await,
        };

        match &result {
            Ok(rs) => {
                let first_row = rs.first().and_then(|row| serde_json::to_string(row).ok());
                tracing::debug!(
                    sql = %statement.sql,
                    params = statement.params.len(),
                    rows = rs.len(),
                    rows_affected = rs.rows_affected,
                    ?first_row,
                    "execSQL"
                );
            }
            Err(e) => {
                tracing::debug!(sql = %statement.sql, error = %e, "execSQL failed");
            }
        }
        result
    }

    /// Execute a script of one or more statements verbatim.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn execute_batch(&self, script: &str) -> Result<(), ModelError> {
        self.ensure_open()?;
        tracing::debug!(sql = %script, bytes = script.len(), "execSQL batch");
        match &self.backend {
            #[cfg(feature = "postgres")]
            Backend::Postgres(pool) => postgres::execute_batch(pool, script).await,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => sqlite::execute_batch(pool, script).await,
        }
    }

    /// Stop accepting statements on every clone of this handle. Pooled
    /// connections are released when the last clone drops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(db_type = ?self.db_type, "connection pool closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ModelError> {
        if self.is_closed() {
            return Err(ModelError::ConnectionError(
                "connection pool is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn scripts_and_statements_are_logged_with_their_sql() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (pool, _supervisor) = ConnectionPool::connect(&DatabaseConfig::new("sqlite::memory:"))
            .await
            .unwrap();
        pool.execute_batch("CREATE TABLE logged (id INTEGER);")
            .await
            .unwrap();
        let rows = pool
            .execute(&pool.compiler().count_sql("logged", None).unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let logs = captured.text();
        assert!(logs.contains("execSQL batch"), "{logs}");
        assert!(logs.contains("CREATE TABLE logged (id INTEGER);"), "{logs}");
        assert!(logs.contains("SELECT COUNT(*) FROM logged"), "{logs}");
    }

    #[tokio::test]
    async fn closed_pool_refuses_scripts() {
        let (pool, _supervisor) = ConnectionPool::connect(&DatabaseConfig::new("sqlite::memory:"))
            .await
            .unwrap();
        pool.close();
        assert!(pool.is_closed());
        let err = pool.execute_batch("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ModelError::ConnectionError(_)));
    }
}
