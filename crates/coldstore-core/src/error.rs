//! Error types and result aliases for coldstore.
//!
//! Errors here cover input validation shared by every crate. Warehouse and
//! archival failures live in `coldstore-archive`.

use crate::partition::PartitionKeyParseError;

/// The result type used throughout coldstore.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in coldstore core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A partition name reported by the warehouse could not be parsed.
    #[error("invalid partition '{name}': {source}")]
    InvalidPartition {
        /// The raw partition name.
        name: String,
        /// Why parsing failed.
        #[source]
        source: PartitionKeyParseError,
    },
}

impl Error {
    /// Creates a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an invalid partition error for a listed name.
    #[must_use]
    pub fn invalid_partition(name: impl Into<String>, source: PartitionKeyParseError) -> Self {
        Self::InvalidPartition {
            name: name.into(),
            source,
        }
    }
}
