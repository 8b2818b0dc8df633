//! Table-scoped data access over PostgreSQL and SQLite.
//!
//! A [`ConnectionPool`] is built once per process from a [`DatabaseConfig`]
//! and shared by every [`Model`]. Each model compiles its CRUD calls through a
//! [`SqlCompiler`], binding values as statement parameters, and runs them on a
//! pooled connection checked out for that statement alone.
//!
//! ```rust,no_run
//! use sql_model::prelude::*;
//!
//! # async fn demo() -> Result<(), ModelError> {
//! let (pool, _supervisor) = ConnectionPool::connect(&DatabaseConfig::new("sqlite:app.db")).await?;
//! let users = Model::new(pool, "users")?;
//! let open = users.count_all_with_constraints(&Constraints::from([("status", "open")])).await?;
//! # let _ = open;
//! # Ok(()) }
//! ```

pub mod compiler;
pub mod config;
pub mod constraints;
pub mod error;
pub mod model;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use compiler::{
    PlaceholderStyle, SqlCompiler, Statement, StatementKind, clause, escape, render_clause,
};
pub use config::DatabaseConfig;
pub use constraints::Constraints;
pub use error::ModelError;
pub use model::{Model, WriteStrategy};
pub use pool::{ConnectionPool, PoolFatalError, PoolStatus, PoolSupervisor};
pub use results::{CustomDbRow, ResultSet};
pub use types::{DatabaseType, RowValues};
