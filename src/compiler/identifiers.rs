use std::sync::LazyLock;

use regex::Regex;

use crate::error::ModelError;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .unwrap_or_else(|e| panic!("identifier pattern failed to compile: {e}"))
});

static PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[A-Za-z_][A-Za-z0-9_]*(\.([A-Za-z_][A-Za-z0-9_]*|\*))?)$")
        .unwrap_or_else(|e| panic!("projection pattern failed to compile: {e}"))
});

/// Table and column names are spliced into SQL text, so only plain or
/// schema-qualified identifiers get through.
pub(crate) fn check_identifier<'a>(kind: &str, name: &'a str) -> Result<&'a str, ModelError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ModelError::InvalidQuery(format!("invalid {kind} name {name:?}")))
    }
}

/// Join a field list, allowing `*` and `table.*` alongside identifiers.
pub(crate) fn projection(fields: &[&str]) -> Result<String, ModelError> {
    if fields.is_empty() {
        return Err(ModelError::InvalidQuery(
            "field list must not be empty; pass \"*\" for all columns".into(),
        ));
    }
    for field in fields {
        if !PROJECTION.is_match(field) {
            return Err(ModelError::InvalidQuery(format!("invalid field name {field:?}")));
        }
    }
    Ok(fields.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        assert!(check_identifier("table", "questions").is_ok());
        assert!(check_identifier("table", "public.questions").is_ok());
        assert!(check_identifier("column", "_created_at2").is_ok());
    }

    #[test]
    fn rejects_sql_fragments() {
        for bad in ["", "1abc", "users; DROP TABLE users", "a b", "a.b.c", "name'"] {
            assert!(check_identifier("table", bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn projection_allows_stars() {
        assert_eq!(projection(&["*"]).unwrap(), "*");
        assert_eq!(projection(&["q.*", "id"]).unwrap(), "q.*,id");
        assert!(projection(&[]).is_err());
        assert!(projection(&["COUNT(*)"]).is_err());
    }
}
