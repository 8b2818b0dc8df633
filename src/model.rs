//! Table-scoped CRUD over a shared [`ConnectionPool`].
//!
//! ```rust,no_run
//! use sql_model::prelude::*;
//!
//! # async fn demo() -> Result<(), ModelError> {
//! let config = DatabaseConfig::from_env(&DatabaseConfig::active_environment())?;
//! let (pool, supervisor) = ConnectionPool::connect(&config).await?;
//! supervisor.terminate_on_fatal();
//!
//! let questions = Model::new(pool.clone(), "questions")?;
//! let row = questions
//!     .insert(&Constraints::from([("headline", "Q1"), ("votes", "0")]), &["id", "headline"])
//!     .await?;
//! # let _ = row;
//! # Ok(()) }
//! ```

use std::path::{Path, PathBuf};

use crate::compiler::{Statement, check_identifier};
use crate::constraints::Constraints;
use crate::error::ModelError;
use crate::pool::ConnectionPool;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

pub const DEFAULT_SCHEMA_SCRIPT: &str = "sql/tables.sql";

/// How `insert` and `update` hand the written row back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// One statement with `RETURNING`; the row comes from the write itself.
    #[default]
    Returning,
    /// Write, then a separate `LIMIT 1` select. The two statements run on
    /// independent checkouts with no transaction, so a concurrent writer can
    /// change or remove the row in between and the read-back may miss it.
    ReadBack,
}

/// CRUD operations against one table.
#[derive(Debug, Clone)]
pub struct Model {
    table: String,
    pool: ConnectionPool,
    write_strategy: WriteStrategy,
    schema_script: PathBuf,
}

impl Model {
    /// Bind a model to `table`. The name is checked before anything touches the pool.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` if `table` is empty or not a plain identifier.
    pub fn new(pool: ConnectionPool, table: impl Into<String>) -> Result<Self, ModelError> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(ModelError::ConfigError(
                "Table name must be defined".to_string(),
            ));
        }
        check_identifier("table", &table).map_err(|e| ModelError::ConfigError(e.to_string()))?;

        Ok(Self {
            table,
            pool,
            write_strategy: WriteStrategy::default(),
            schema_script: PathBuf::from(DEFAULT_SCHEMA_SCRIPT),
        })
    }

    #[must_use]
    pub fn with_write_strategy(mut self, write_strategy: WriteStrategy) -> Self {
        self.write_strategy = write_strategy;
        self
    }

    /// Script run by [`bootstrap_tables`](Self::bootstrap_tables).
    #[must_use]
    pub fn with_schema_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_script = path.into();
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    #[must_use]
    pub fn write_strategy(&self) -> WriteStrategy {
        self.write_strategy
    }

    #[must_use]
    pub fn schema_script(&self) -> &Path {
        &self.schema_script
    }

    /// Every row of the table, projected to `fields`.
    ///
    /// # Errors
    /// `InvalidQuery` for a bad field list, `ExecutionError` if the statement fails.
    pub async fn select_all(&self, fields: &[&str]) -> Result<ResultSet, ModelError> {
        tracing::debug!(table = %self.table, ?fields, "select_all - selecting all fields");
        let statement = self
            .pool
            .compiler()
            .select_sql(&self.table, fields, None, None)?;
        self.run("select_all", &statement).await
    }

    /// Rows matching every constraint; no constraints means every row.
    ///
    /// # Errors
    /// `InvalidQuery` for bad identifiers, `ExecutionError` if the statement fails.
    pub async fn select_with_constraints(
        &self,
        fields: &[&str],
        constraints: Option<&Constraints>,
    ) -> Result<ResultSet, ModelError> {
        let Some(constraints) = constraints.filter(|c| !c.is_empty()) else {
            return self.select_all(fields).await;
        };
        tracing::debug!(
            table = %self.table,
            ?fields,
            ?constraints,
            "select_with_constraints - selecting with constraints"
        );
        let statement = self
            .pool
            .compiler()
            .select_sql(&self.table, fields, Some(constraints), None)?;
        self.run("select_with_constraints", &statement).await
    }

    /// The first row matching every constraint, if any.
    ///
    /// # Errors
    /// `EmptyConstraints` when `constraints` is empty, `ExecutionError` if the statement fails.
    pub async fn select_one(
        &self,
        fields: &[&str],
        constraints: &Constraints,
    ) -> Result<Option<CustomDbRow>, ModelError> {
        tracing::debug!(table = %self.table, ?fields, ?constraints, "select_one");
        if constraints.is_empty() {
            return Err(ModelError::EmptyConstraints {
                operation: "select_one",
            });
        }
        let statement = self
            .pool
            .compiler()
            .select_sql(&self.table, fields, Some(constraints), Some(1))?;
        Ok(self.run("select_one", &statement).await?.into_first())
    }

    /// Number of rows matching every constraint; empty counts the whole table.
    ///
    /// # Errors
    /// `ExecutionError` if the statement fails or returns no count.
    pub async fn count_all_with_constraints(
        &self,
        constraints: &Constraints,
    ) -> Result<i64, ModelError> {
        const OPERATION: &str = "count_all_with_constraints";
        tracing::debug!(table = %self.table, ?constraints, "count_all_with_constraints");
        let statement = self.pool.compiler().count_sql(&self.table, Some(constraints))?;
        let result = self.run(OPERATION, &statement).await?;
        result
            .first()
            .and_then(|row| row.get_by_index(0))
            .and_then(RowValues::as_int)
            .copied()
            .ok_or_else(|| ModelError::ExecutionError {
                operation: OPERATION,
                message: "COUNT(*) returned no integer".to_string(),
            })
    }

    /// Insert one row and hand it back projected to `fields`.
    ///
    /// With [`WriteStrategy::ReadBack`] the row is looked up again by every
    /// inserted value, so `None` means the lookup found nothing.
    ///
    /// # Errors
    /// `EmptyConstraints` when `constraints` is empty, `ExecutionError` if either statement fails.
    pub async fn insert(
        &self,
        constraints: &Constraints,
        fields: &[&str],
    ) -> Result<Option<CustomDbRow>, ModelError> {
        const OPERATION: &str = "insert";
        tracing::debug!(
            table = %self.table,
            ?constraints,
            ?fields,
            strategy = ?self.write_strategy,
            "insert"
        );
        let compiler = self.pool.compiler();
        match self.write_strategy {
            WriteStrategy::Returning => {
                let statement = compiler.insert_sql(&self.table, constraints, Some(fields))?;
                Ok(self.run(OPERATION, &statement).await?.into_first())
            }
            WriteStrategy::ReadBack => {
                let write = compiler.insert_sql(&self.table, constraints, None)?;
                let read = compiler.select_sql(&self.table, fields, Some(constraints), Some(1))?;
                self.run(OPERATION, &write).await?;
                Ok(self.run(OPERATION, &read).await?.into_first())
            }
        }
    }

    /// Apply `update_fields` to rows matching `constraints` and hand back one
    /// updated row projected to `fields`. The UPDATE runs exactly once.
    ///
    /// With [`WriteStrategy::ReadBack`] the follow-up lookup filters by
    /// `update_fields`, so it returns some row carrying the new values, which
    /// is the updated one unless another row already held them.
    ///
    /// # Errors
    /// `EmptyConstraints` when either map is empty, `ExecutionError` if either statement fails.
    pub async fn update(
        &self,
        update_fields: &Constraints,
        constraints: &Constraints,
        fields: &[&str],
    ) -> Result<Option<CustomDbRow>, ModelError> {
        const OPERATION: &str = "update";
        tracing::debug!(
            table = %self.table,
            ?update_fields,
            ?constraints,
            ?fields,
            strategy = ?self.write_strategy,
            "update"
        );
        let compiler = self.pool.compiler();
        match self.write_strategy {
            WriteStrategy::Returning => {
                let statement =
                    compiler.update_sql(&self.table, update_fields, constraints, Some(fields))?;
                Ok(self.run(OPERATION, &statement).await?.into_first())
            }
            WriteStrategy::ReadBack => {
                let write = compiler.update_sql(&self.table, update_fields, constraints, None)?;
                let read =
                    compiler.select_sql(&self.table, fields, Some(update_fields), Some(1))?;
                self.run(OPERATION, &write).await?;
                Ok(self.run(OPERATION, &read).await?.into_first())
            }
        }
    }

    /// Delete rows matching every constraint; returns how many went.
    ///
    /// # Errors
    /// `EmptyConstraints` when `constraints` is empty, `ExecutionError` if the statement fails.
    pub async fn delete(&self, constraints: &Constraints) -> Result<usize, ModelError> {
        tracing::debug!(table = %self.table, ?constraints, "delete");
        let statement = self.pool.compiler().delete_sql(&self.table, constraints)?;
        Ok(self.run("delete", &statement).await?.rows_affected)
    }

    /// Run the schema script verbatim.
    ///
    /// # Errors
    /// `ResourceReadError` if the script cannot be read, `ExecutionError` if it fails.
    pub async fn bootstrap_tables(&self) -> Result<(), ModelError> {
        let script = tokio::fs::read_to_string(&self.schema_script)
            .await
            .map_err(|source| ModelError::ResourceReadError {
                path: self.schema_script.clone(),
                source,
            })?;
        tracing::info!(path = %self.schema_script.display(), "bootstrapping tables");
        self.pool
            .execute_batch(&script)
            .await
            .map_err(|e| e.in_operation("bootstrap_tables"))
    }

    async fn run(
        &self,
        operation: &'static str,
        statement: &Statement,
    ) -> Result<ResultSet, ModelError> {
        self.pool
            .execute(statement)
            .await
            .map_err(|e| e.in_operation(operation))
    }
}
