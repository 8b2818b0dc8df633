use crate::types::RowValues;

/// Ordered column → value mapping used for WHERE filters and for the values
/// of INSERT/UPDATE statements.
///
/// Iteration order is insertion order. Inserting a column that is already
/// present replaces its value without moving it.
///
/// ```rust
/// use sql_model::prelude::*;
///
/// let filter = Constraints::from([("status", "open"), ("owner", "ada")]);
/// assert_eq!(filter.columns().collect::<Vec<_>>(), ["status", "owner"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    entries: Vec<(String, RowValues)>,
}

impl Constraints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, keeping the original position on replace.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<RowValues>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder form of [`Constraints::insert`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(column, value);
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for Constraints
where
    K: Into<String>,
    V: Into<RowValues>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut constraints = Constraints::new();
        for (column, value) in iter {
            constraints.insert(column, value);
        }
        constraints
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Constraints
where
    K: Into<String>,
    V: Into<RowValues>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}
