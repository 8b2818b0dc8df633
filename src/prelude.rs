//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_model::prelude::*;
//! ```

pub use crate::compiler::{PlaceholderStyle, SqlCompiler, Statement, StatementKind};
pub use crate::config::DatabaseConfig;
pub use crate::constraints::Constraints;
pub use crate::error::ModelError;
pub use crate::model::{Model, WriteStrategy};
pub use crate::pool::{ConnectionPool, PoolFatalError, PoolStatus, PoolSupervisor};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{DatabaseType, RowValues};
