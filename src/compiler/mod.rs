//! Pure SQL construction from table names, field lists and constraint maps.
//!
//! Every statement keeps the same shape regardless of how values are spelled:
//! filters are joined with `" AND "`, SET lists with `","`, and INSERT emits
//! columns and values from one pass over the map so their order always agrees.

mod identifiers;
mod placeholder;

pub use placeholder::{PlaceholderStyle, escape};

pub(crate) use identifiers::check_identifier;
use identifiers::projection;

use crate::constraints::Constraints;
use crate::error::ModelError;
use crate::types::RowValues;

/// Delimiter for WHERE filters.
pub const AND: &str = " AND ";
/// Delimiter for SET lists.
pub const COMMA: &str = ",";

/// Whether a statement hands back rows or only an affected-row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, or a write with `RETURNING`.
    Query,
    /// INSERT/UPDATE/DELETE without `RETURNING`.
    Execute,
}

/// A compiled statement: SQL text plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<RowValues>,
    pub kind: StatementKind,
}

/// Render `constraints` as `col='value'` terms joined by `delimiter`, with
/// values passed through [`escape`].
///
/// ```rust
/// use sql_model::prelude::*;
/// use sql_model::compiler::{clause, AND};
///
/// let filter = Constraints::from([("name", "O'Brien"), ("status", "open")]);
/// assert_eq!(clause(&filter, AND), "name='O`Brien' AND status='open'");
/// ```
#[must_use]
pub fn clause(constraints: &Constraints, delimiter: &str) -> String {
    let mut unused = Vec::new();
    render_clause(constraints, delimiter, PlaceholderStyle::Inline, &mut unused)
}

/// Bound form of [`clause`]: same shape, values spelled per `style` and
/// appended to `params` in term order.
///
/// ```rust
/// use sql_model::prelude::*;
/// use sql_model::compiler::{render_clause, AND};
///
/// let mut params = Vec::new();
/// let filter = Constraints::from([("status", "open"), ("owner", "ada")]);
/// let sql = render_clause(&filter, AND, PlaceholderStyle::Postgres, &mut params);
/// assert_eq!(sql, "status=$1 AND owner=$2");
/// assert_eq!(params.len(), 2);
/// ```
#[must_use]
pub fn render_clause(
    constraints: &Constraints,
    delimiter: &str,
    style: PlaceholderStyle,
    params: &mut Vec<RowValues>,
) -> String {
    constraints
        .iter()
        .map(|(column, value)| format!("{column}={}", style.render(value, params)))
        .collect::<Vec<_>>()
        .join(delimiter)
}

fn check_columns(constraints: &Constraints) -> Result<(), ModelError> {
    for column in constraints.columns() {
        check_identifier("column", column)?;
    }
    Ok(())
}

fn require(constraints: &Constraints, operation: &'static str) -> Result<(), ModelError> {
    if constraints.is_empty() {
        return Err(ModelError::EmptyConstraints { operation });
    }
    check_columns(constraints)
}

/// Builds [`Statement`]s for one placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlCompiler {
    style: PlaceholderStyle,
}

impl SqlCompiler {
    #[must_use]
    pub fn new(style: PlaceholderStyle) -> Self {
        Self { style }
    }

    #[must_use]
    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// `SELECT f1,f2 FROM table [WHERE …] [LIMIT n]`. An empty filter means no WHERE.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidQuery` for an empty field list or a bad identifier.
    pub fn select_sql(
        &self,
        table: &str,
        fields: &[&str],
        filter: Option<&Constraints>,
        limit: Option<u64>,
    ) -> Result<Statement, ModelError> {
        let table = check_identifier("table", table)?;
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {table}", projection(fields)?);
        self.push_where(&mut sql, filter, &mut params)?;
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(Statement {
            sql,
            params,
            kind: StatementKind::Query,
        })
    }

    /// `SELECT COUNT(*) FROM table [WHERE …]`. An empty filter means no WHERE.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidQuery` for a bad identifier.
    pub fn count_sql(
        &self,
        table: &str,
        filter: Option<&Constraints>,
    ) -> Result<Statement, ModelError> {
        let table = check_identifier("table", table)?;
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        self.push_where(&mut sql, filter, &mut params)?;
        Ok(Statement {
            sql,
            params,
            kind: StatementKind::Query,
        })
    }

    /// `INSERT INTO table (c1,c2) VALUES (v1,v2) [RETURNING …]`.
    ///
    /// # Errors
    /// Returns `ModelError::EmptyConstraints` when `values` is empty and
    /// `ModelError::InvalidQuery` for bad identifiers.
    pub fn insert_sql(
        &self,
        table: &str,
        values: &Constraints,
        returning: Option<&[&str]>,
    ) -> Result<Statement, ModelError> {
        let table = check_identifier("table", table)?;
        require(values, "insert")?;

        let mut params = Vec::with_capacity(values.len());
        let mut columns = Vec::with_capacity(values.len());
        let mut rendered = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            columns.push(column);
            rendered.push(self.style.render(value, &mut params));
        }

        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(COMMA),
            rendered.join(COMMA)
        );
        let kind = push_returning(&mut sql, returning)?;
        Ok(Statement { sql, params, kind })
    }

    /// `UPDATE table SET a=…,b=… WHERE x=… AND y=… [RETURNING …]`.
    ///
    /// # Errors
    /// Returns `ModelError::EmptyConstraints` when either map is empty and
    /// `ModelError::InvalidQuery` for bad identifiers.
    pub fn update_sql(
        &self,
        table: &str,
        set: &Constraints,
        filter: &Constraints,
        returning: Option<&[&str]>,
    ) -> Result<Statement, ModelError> {
        let table = check_identifier("table", table)?;
        require(set, "update")?;
        require(filter, "update")?;

        let mut params = Vec::with_capacity(set.len() + filter.len());
        let assignments = render_clause(set, COMMA, self.style, &mut params);
        let predicate = render_clause(filter, AND, self.style, &mut params);
        let mut sql = format!("UPDATE {table} SET {assignments} WHERE {predicate}");
        let kind = push_returning(&mut sql, returning)?;
        Ok(Statement { sql, params, kind })
    }

    /// `DELETE FROM table WHERE …`.
    ///
    /// # Errors
    /// Returns `ModelError::EmptyConstraints` when `filter` is empty and
    /// `ModelError::InvalidQuery` for bad identifiers.
    pub fn delete_sql(&self, table: &str, filter: &Constraints) -> Result<Statement, ModelError> {
        let table = check_identifier("table", table)?;
        require(filter, "delete")?;

        let mut params = Vec::with_capacity(filter.len());
        let predicate = render_clause(filter, AND, self.style, &mut params);
        Ok(Statement {
            sql: format!("DELETE FROM {table} WHERE {predicate}"),
            params,
            kind: StatementKind::Execute,
        })
    }

    fn push_where(
        &self,
        sql: &mut String,
        filter: Option<&Constraints>,
        params: &mut Vec<RowValues>,
    ) -> Result<(), ModelError> {
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            check_columns(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&render_clause(filter, AND, self.style, params));
        }
        Ok(())
    }
}

fn push_returning(
    sql: &mut String,
    returning: Option<&[&str]>,
) -> Result<StatementKind, ModelError> {
    match returning {
        Some(fields) => {
            sql.push_str(" RETURNING ");
            sql.push_str(&projection(fields)?);
            Ok(StatementKind::Query)
        }
        None => Ok(StatementKind::Execute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg() -> SqlCompiler {
        SqlCompiler::new(PlaceholderStyle::Postgres)
    }

    fn inline() -> SqlCompiler {
        SqlCompiler::new(PlaceholderStyle::Inline)
    }

    #[test]
    fn clause_has_one_term_per_entry() {
        let filter: Constraints = (0..5).map(|i| (format!("c{i}"), i64::from(i))).collect();
        let sql = clause(&filter, AND);
        assert_eq!(sql.matches(" AND ").count(), 4);
        assert_eq!(sql, "c0='0' AND c1='1' AND c2='2' AND c3='3' AND c4='4'");

        let single = Constraints::from([("id", "1")]);
        assert_eq!(clause(&single, AND), "id='1'");
        assert_eq!(clause(&Constraints::new(), AND), "");
    }

    #[test]
    fn clause_escapes_values() {
        let set = Constraints::from([("name", "O'Brien"), ("bio", "it's 'fine'")]);
        assert_eq!(clause(&set, COMMA), "name='O`Brien',bio='it`s `fine`'");
    }

    #[test]
    fn select_with_and_without_filter() {
        let all = pg().select_sql("questions", &["id", "headline"], None, None).unwrap();
        assert_eq!(all.sql, "SELECT id,headline FROM questions");
        assert!(all.params.is_empty());
        assert_eq!(all.kind, StatementKind::Query);

        let filter = Constraints::from([("status", "open"), ("owner", "ada")]);
        let one = pg()
            .select_sql("questions", &["*"], Some(&filter), Some(1))
            .unwrap();
        assert_eq!(
            one.sql,
            "SELECT * FROM questions WHERE status=$1 AND owner=$2 LIMIT 1"
        );
        assert_eq!(one.params, vec![RowValues::from("open"), RowValues::from("ada")]);
    }

    #[test]
    fn empty_filter_drops_where() {
        let stmt = pg()
            .select_sql("questions", &["id"], Some(&Constraints::new()), None)
            .unwrap();
        assert_eq!(stmt.sql, "SELECT id FROM questions");
        let count = pg().count_sql("questions", Some(&Constraints::new())).unwrap();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM questions");
    }

    #[test]
    fn count_with_filter() {
        let filter = Constraints::from([("status", "open")]);
        let stmt = SqlCompiler::new(PlaceholderStyle::Sqlite)
            .count_sql("questions", Some(&filter))
            .unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM questions WHERE status=?1");
    }

    #[test]
    fn insert_keeps_columns_and_values_aligned() {
        let values = Constraints::from([("headline", "Q1"), ("votes", "0")]);
        let stmt = pg().insert_sql("questions", &values, None).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO questions (headline,votes) VALUES ($1,$2)");
        assert_eq!(stmt.params, vec![RowValues::from("Q1"), RowValues::from("0")]);
        assert_eq!(stmt.kind, StatementKind::Execute);

        let literal = inline().insert_sql("questions", &values, None).unwrap();
        assert_eq!(
            literal.sql,
            "INSERT INTO questions (headline,votes) VALUES ('Q1','0')"
        );
        assert!(literal.params.is_empty());
    }

    #[test]
    fn insert_returning_is_a_query() {
        let values = Constraints::from([("headline", "Q1")]);
        let stmt = pg()
            .insert_sql("questions", &values, Some(&["id", "headline"][..]))
            .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO questions (headline) VALUES ($1) RETURNING id,headline"
        );
        assert_eq!(stmt.kind, StatementKind::Query);
    }

    #[test]
    fn update_uses_comma_for_set_and_and_for_where() {
        let set = Constraints::from([("votes", "5"), ("headline", "Q1b")]);
        let filter = Constraints::from([("id", "1"), ("owner", "ada")]);
        let stmt = pg().update_sql("questions", &set, &filter, None).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE questions SET votes=$1,headline=$2 WHERE id=$3 AND owner=$4"
        );
        assert_eq!(stmt.params.len(), 4);

        let literal = inline().update_sql("questions", &set, &filter, None).unwrap();
        assert_eq!(
            literal.sql,
            "UPDATE questions SET votes='5',headline='Q1b' WHERE id='1' AND owner='ada'"
        );
    }

    #[test]
    fn delete_requires_a_filter() {
        let stmt = pg()
            .delete_sql("questions", &Constraints::from([("id", 3_i64)]))
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM questions WHERE id=$1");
        assert_eq!(stmt.kind, StatementKind::Execute);

        let err = pg().delete_sql("questions", &Constraints::new()).unwrap_err();
        assert!(matches!(err, ModelError::EmptyConstraints { operation: "delete" }));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let filter = Constraints::from([("id = 1 OR 1", "1")]);
        assert!(matches!(
            pg().select_sql("questions", &["id"], Some(&filter), None),
            Err(ModelError::InvalidQuery(_))
        ));
        assert!(matches!(
            pg().count_sql("questions; DROP TABLE users", None),
            Err(ModelError::InvalidQuery(_))
        ));
        assert!(matches!(
            pg().select_sql("questions", &[], None, None),
            Err(ModelError::InvalidQuery(_))
        ));
    }
}
