use crate::types::RowValues;

/// How values are spelled inside compiled SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
    /// Values are written into the SQL text as quoted literals passed through
    /// [`escape`]. No parameters are collected.
    Inline,
}

impl PlaceholderStyle {
    /// Emit the SQL for one value, recording it in `params` when it is bound.
    pub(crate) fn render(self, value: &RowValues, params: &mut Vec<RowValues>) -> String {
        match self {
            PlaceholderStyle::Postgres => {
                params.push(value.clone());
                format!("${}", params.len())
            }
            PlaceholderStyle::Sqlite => {
                params.push(value.clone());
                format!("?{}", params.len())
            }
            PlaceholderStyle::Inline => format!("'{}'", escape(value)),
        }
    }
}

/// Replace every single quote in the string form of `value` with a backtick.
///
/// This only exists for [`PlaceholderStyle::Inline`] rendering. It is not
/// standards-compliant escaping and does not stop injection for every value
/// shape; the pool-backed compilers always bind values instead.
///
/// ```rust
/// use sql_model::compiler::escape;
///
/// assert_eq!(escape(&"O'Brien"), "O`Brien");
/// ```
#[must_use]
pub fn escape(value: &impl std::fmt::Display) -> String {
    value.to_string().replace('\'', "`")
}
