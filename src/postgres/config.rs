use std::future::Future;

use bb8::{ManageConnection, Pool};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::{Client, Connection, NoTls};

use crate::config::DatabaseConfig;
use crate::error::ModelError;
use crate::pool::supervisor::FatalReporter;

/// TLS mode chosen from the `ssl` flag at pool creation.
#[derive(Clone)]
pub(crate) enum PgTls {
    Disabled,
    #[cfg(feature = "tls")]
    Enabled(postgres_native_tls::MakeTlsConnector),
}

impl PgTls {
    #[cfg(feature = "tls")]
    fn from_flag(ssl: bool) -> Result<Self, ModelError> {
        if !ssl {
            return Ok(PgTls::Disabled);
        }
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| ModelError::ConfigError(format!("could not build TLS connector: {e}")))?;
        Ok(PgTls::Enabled(postgres_native_tls::MakeTlsConnector::new(
            connector,
        )))
    }

    #[cfg(not(feature = "tls"))]
    fn from_flag(ssl: bool) -> Result<Self, ModelError> {
        if ssl {
            return Err(ModelError::ConfigError(
                "ssl requested but this build lacks the `tls` feature".to_string(),
            ));
        }
        Ok(PgTls::Disabled)
    }
}

/// bb8 manager for Postgres clients.
///
/// Each client's connection future runs on its own task. If that task ends
/// with an error the failure goes to the pool supervisor.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
    tls: PgTls,
    reporter: FatalReporter,
}

impl PgManager {
    pub(crate) fn new(config: tokio_postgres::Config, tls: PgTls, reporter: FatalReporter) -> Self {
        Self {
            config,
            tls,
            reporter,
        }
    }
}

fn watch_connection<S, T>(connection: Connection<S, T>, reporter: FatalReporter)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            reporter.report(e);
        }
    });
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        let tls = self.tls.clone();
        let reporter = self.reporter.clone();
        async move {
            tracing::debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let client = match tls {
                PgTls::Disabled => {
                    let (client, connection) = cfg.connect(NoTls).await?;
                    watch_connection(connection, reporter);
                    client
                }
                #[cfg(feature = "tls")]
                PgTls::Enabled(tls) => {
                    let (client, connection) = cfg.connect(tls).await?;
                    watch_connection(connection, reporter);
                    client
                }
            };
            tracing::debug!("postgres connect established");
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Build the Postgres pool described by `config`.
///
/// # Errors
/// Returns `ModelError::ConfigError` for an unparsable connection string or an
/// unsupported SSL request, and `ModelError::ConnectionError` if bb8 fails to
/// start the pool.
pub(crate) async fn build_pool(
    config: &DatabaseConfig,
    reporter: FatalReporter,
) -> Result<Pool<PgManager>, ModelError> {
    let pg_config: tokio_postgres::Config = config.url.parse().map_err(|e| {
        ModelError::ConfigError(format!("invalid postgres connection string: {e}"))
    })?;
    if pg_config.get_dbname().is_none() {
        return Err(ModelError::ConfigError("dbname is required".to_string()));
    }
    let tls = PgTls::from_flag(config.ssl)?;

    Pool::builder()
        .max_size(config.max_size)
        .connection_timeout(config.connection_timeout)
        .error_sink(Box::new(reporter.clone()))
        .build(PgManager::new(pg_config, tls, reporter))
        .await
        .map_err(|e| ModelError::ConnectionError(format!("postgres pool error: {e}")))
}
