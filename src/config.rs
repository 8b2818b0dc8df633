//! Process configuration for the connection pool.
//!
//! Values are resolved from the environment the way the application's
//! deployment scripts set them:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `APP_ENV` | active environment name, default `development` |
//! | `DATABASE_URL_<ENV>` | connection string for that environment |
//! | `DATABASE_URL` | fallback connection string |
//! | `ENABLE_SSL` | `true` / `false` (JSON boolean), default `false` |
//! | `DATABASE_MAX_CONNECTIONS` | pool size, default 10 |
//! | `DATABASE_CONNECT_TIMEOUT_SECS` | checkout timeout, default 30 |

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ModelError;
use crate::types::DatabaseType;

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_MAX_SIZE: u32 = 10;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

static URL_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(://[^:/@]+:)[^@]*@")
        .unwrap_or_else(|e| panic!("password pattern failed to compile: {e}"))
});

// libpq key=value form; the value may be single-quoted with backslash escapes
static KEYWORD_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bpassword\s*=\s*)('(?:[^'\\]|\\.)*'|\S+)")
        .unwrap_or_else(|e| panic!("keyword password pattern failed to compile: {e}"))
});

/// Connection keywords that mark a libpq key=value connection string.
const LIBPQ_KEYWORDS: &[&str] = &[
    "host",
    "hostaddr",
    "port",
    "dbname",
    "user",
    "password",
    "passfile",
    "sslmode",
    "connect_timeout",
    "application_name",
    "options",
];

/// Connection settings for one [`ConnectionPool`](crate::pool::ConnectionPool).
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// `postgres://…`, a libpq key=value string, `sqlite:path` or a bare file path.
    pub url: String,
    /// Use TLS for Postgres connections.
    pub ssl: bool,
    pub max_size: u32,
    pub connection_timeout: Duration,
}

impl DatabaseConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ssl: false,
            max_size: DEFAULT_MAX_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// The environment name from `APP_ENV`.
    #[must_use]
    pub fn active_environment() -> String {
        std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Resolve the configuration for `environment` from the process environment.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` when no URL is set or a flag is malformed.
    pub fn from_env(environment: &str) -> Result<Self, ModelError> {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`] with an explicit variable lookup.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` when no URL is set or a flag is malformed.
    pub fn from_lookup<F>(environment: &str, lookup: F) -> Result<Self, ModelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scoped_key = format!(
            "DATABASE_URL_{}",
            environment.trim().to_ascii_uppercase().replace('-', "_")
        );
        let url = lookup(&scoped_key)
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ModelError::ConfigError(format!(
                    "no connection string for environment {environment:?}; set {scoped_key} or DATABASE_URL"
                ))
            })?;

        let mut config = DatabaseConfig::new(url.trim());
        if let Some(raw) = lookup("ENABLE_SSL") {
            config.ssl = parse_ssl_flag(&raw)?;
        }
        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_size = parse_number::<u32>("DATABASE_MAX_CONNECTIONS", &raw)?;
            if config.max_size == 0 {
                return Err(ModelError::ConfigError(
                    "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
                ));
            }
        }
        if let Some(raw) = lookup("DATABASE_CONNECT_TIMEOUT_SECS") {
            config.connection_timeout =
                Duration::from_secs(parse_number::<u64>("DATABASE_CONNECT_TIMEOUT_SECS", &raw)?);
        }
        Ok(config)
    }

    /// The backend the URL points at.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` for an empty URL or a backend this build lacks.
    pub fn database_type(&self) -> Result<DatabaseType, ModelError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ModelError::ConfigError("database url is empty".to_string()));
        }
        if is_postgres_url(url) {
            postgres_type()
        } else {
            sqlite_type()
        }
    }

    /// The database file for SQLite URLs; `None` for Postgres URLs.
    #[must_use]
    pub fn sqlite_path(&self) -> Option<&str> {
        let url = self.url.trim();
        if url.is_empty() || is_postgres_url(url) {
            return None;
        }
        Some(
            url.strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(url),
        )
    }

    /// The URL with any password replaced, safe to log.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let url = URL_PASSWORD.replace(&self.url, "${1}****@");
        KEYWORD_PASSWORD.replace_all(&url, "${1}****").into_owned()
    }
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://") || is_keyword_string(url)
}

/// `host=… dbname=…`: the leading token must be a known libpq keyword.
fn is_keyword_string(url: &str) -> bool {
    url.split_once('=')
        .is_some_and(|(key, _)| LIBPQ_KEYWORDS.contains(&key.trim()))
}

#[cfg(feature = "postgres")]
fn postgres_type() -> Result<DatabaseType, ModelError> {
    Ok(DatabaseType::Postgres)
}

#[cfg(not(feature = "postgres"))]
fn postgres_type() -> Result<DatabaseType, ModelError> {
    Err(ModelError::ConfigError(
        "postgres support is not enabled in this build".to_string(),
    ))
}

#[cfg(feature = "sqlite")]
fn sqlite_type() -> Result<DatabaseType, ModelError> {
    Ok(DatabaseType::Sqlite)
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_type() -> Result<DatabaseType, ModelError> {
    Err(ModelError::ConfigError(
        "sqlite support is not enabled in this build".to_string(),
    ))
}

/// `ENABLE_SSL` is read as a JSON boolean, so only `true` and `false` pass.
fn parse_ssl_flag(raw: &str) -> Result<bool, ModelError> {
    serde_json::from_str::<bool>(raw.trim())
        .map_err(|_| {
            ModelError::ConfigError(format!("ENABLE_SSL must be true or false, got {raw:?}"))
        })
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ModelError> {
    raw.trim()
        .parse()
        .map_err(|_| ModelError::ConfigError(format!("{key} must be a number, got {raw:?}")))
}
