use std::sync::Arc;

use rusqlite::types::{Value, ValueRef};

use crate::error::ModelError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Map one column of a `SQLite` row to its storage class.
///
/// # Errors
/// Returns `ModelError` if the column is out of range or holds invalid UTF-8 text.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, ModelError> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(bytes) => RowValues::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| ModelError::ParameterError(format!("column {idx} is not UTF-8: {e}")))?
                .to_owned(),
        ),
        ValueRef::Blob(bytes) => RowValues::Blob(bytes.to_vec()),
    })
}

/// Step a prepared statement to completion, collecting every row.
///
/// Works for SELECT and for writes carrying `RETURNING`.
///
/// # Errors
/// Returns the driver error if a step or an extraction fails.
pub fn build_result_set(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<ResultSet, ModelError> {
    let columns: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    );
    let width = columns.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(columns);

    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|idx| sqlite_extract_value_sync(row, idx))
            .collect::<Result<Vec<_>, _>>()?;
        result_set.add_row_values(values);
    }

    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    #[test]
    fn rows_keep_storage_classes_and_projection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT);
             INSERT INTO t VALUES (7, 1.5, 'x', x'0102', NULL);",
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT i, r, s, b, n FROM t WHERE i = ?1").unwrap();
        let rs = build_result_set(&mut stmt, &[Value::Integer(7)]).unwrap();
        assert_eq!(rs.len(), 1);
        let row = rs.first().unwrap();
        assert_eq!(row.get("i").and_then(RowValues::as_int), Some(&7));
        assert_eq!(row.get("r").and_then(RowValues::as_float), Some(1.5));
        assert_eq!(row.get("s").and_then(RowValues::as_text), Some("x"));
        assert_eq!(row.get("b").and_then(RowValues::as_blob), Some(&[1_u8, 2][..]));
        assert!(row.get("n").is_some_and(RowValues::is_null));

        let empty = build_result_set(&mut stmt, &[Value::Integer(8)]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.get_column_names().map(|c| c.len()), Some(5));
    }
}
