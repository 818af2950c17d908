//! Partition selection for an archival run.
//!
//! A selector keeps a partition when every exact-match filter holds and, if a
//! cutoff is set, the partition's value for the cutoff column sorts strictly
//! before the cutoff value. Cutoffs compare as strings, which orders ISO dates
//! and zero-padded numbers correctly.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::partition::PartitionKey;

/// Filters deciding which partitions of a table are archived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSelector {
    matches: Vec<(String, String)>,
    before: Option<(String, String)>,
}

impl PartitionSelector {
    /// Creates a selector that keeps every partition.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Requires `column` to equal `value`.
    #[must_use]
    pub fn with_match(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.matches.push((column.into(), value.into()));
        self
    }

    /// Requires `column` to sort strictly before `value`.
    #[must_use]
    pub fn with_before(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.before = Some((column.into(), value.into()));
        self
    }

    /// Returns the columns this selector filters on.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.matches
            .iter()
            .map(|(c, _)| c.as_str())
            .chain(self.before.iter().map(|(c, _)| c.as_str()))
    }

    /// Checks that every filtered column is one of `partition_columns`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first unknown column.
    pub fn validate_columns(&self, partition_columns: &[String]) -> Result<()> {
        if let Some(unknown) = self
            .columns()
            .find(|c| !partition_columns.iter().any(|p| p == c))
        {
            return Err(Error::invalid_input(format!(
                "'{unknown}' is not a partition column (partition columns: {})",
                partition_columns.join(", ")
            )));
        }
        Ok(())
    }

    /// Returns true when `key` passes every filter.
    ///
    /// A filter on a column the key does not carry rejects the key.
    #[must_use]
    pub fn selects(&self, key: &PartitionKey) -> bool {
        let matches = self
            .matches
            .iter()
            .all(|(column, value)| key.get(column) == Some(value.as_str()));
        let before = self
            .before
            .as_ref()
            .is_none_or(|(column, cutoff)| key.get(column).is_some_and(|v| v < cutoff.as_str()));
        matches && before
    }
}
