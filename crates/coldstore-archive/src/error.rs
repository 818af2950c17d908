//! Error types for `coldstore-archive`.
//!
//! [`GatewayError`] describes why a single warehouse call did not succeed.
//! [`ArchiveError`] is the archival taxonomy: every failing step of a
//! partition's move is converted into one of these and recorded on the
//! partition's outcome rather than propagated out of the run.

use std::time::Duration;

/// Result type for archival operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A warehouse call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The query engine ran and reported failure.
    #[error("statement failed: {message} (statement: {statement})")]
    Execution {
        /// The statement that failed.
        statement: String,
        /// Engine output or exit status.
        message: String,
    },

    /// The query engine could not be started.
    #[error("failed to start query engine: {message}")]
    Spawn {
        /// Description of the spawn failure.
        message: String,
    },

    /// The statement did not finish within the configured timeout.
    #[error("statement timed out after {after:?} (statement: {statement})")]
    Timeout {
        /// The statement that timed out.
        statement: String,
        /// The configured timeout.
        after: Duration,
    },

    /// A row count reply was missing or not a non-negative integer.
    #[error("row count unavailable for {table}: reply was {reply:?}")]
    RowCountUnavailable {
        /// The counted table.
        table: String,
        /// The raw reply (empty when the query itself failed).
        reply: String,
    },
}

impl GatewayError {
    /// Creates an execution error.
    #[must_use]
    pub fn execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

/// Archival failures, recorded per partition or per table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    /// A statement that moves or creates data failed.
    #[error("gateway execution failed: {0}")]
    GatewayExecution(GatewayError),

    /// A row count needed for verification could not be obtained.
    #[error("row count unavailable for {table} where {condition}: {source}")]
    RowCountUnavailable {
        /// The counted table.
        table: String,
        /// The counted condition.
        condition: String,
        /// The underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    /// A verification count did not match the expected value.
    #[error("row count mismatch on {table}: expected {expected}, found {actual}")]
    RowCountMismatch {
        /// The counted table.
        table: String,
        /// The expected number of rows.
        expected: u64,
        /// The number of rows reported.
        actual: u64,
    },

    /// The source table's creation statement could not be retrieved.
    #[error("could not fetch creation statement for {table}: {source}")]
    SchemaFetch {
        /// The source table.
        table: String,
        /// The underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    /// The creation statement could not be transformed.
    #[error("malformed creation statement: {reason}")]
    SchemaMalformed {
        /// Why the statement could not be transformed.
        reason: String,
    },

    /// Rolling back a partial move did not succeed; needs manual follow-up.
    #[error("rollback failed: {reason}")]
    RollbackFailed {
        /// Why the rollback failed.
        reason: String,
    },

    /// A partition outcome was asked to make an illegal state change.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The rejected target state.
        to: String,
    },

    /// A shared primitive rejected its input.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Clonable wrapper for [`coldstore_core::Error`] messages.
///
/// Outcomes are cloned into summaries, so the core error is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CoreError(String);

impl From<coldstore_core::Error> for ArchiveError {
    fn from(err: coldstore_core::Error) -> Self {
        Self::Core(CoreError(err.to_string()))
    }
}

impl ArchiveError {
    /// Creates a malformed schema error.
    #[must_use]
    pub fn schema_malformed(reason: impl Into<String>) -> Self {
        Self::SchemaMalformed {
            reason: reason.into(),
        }
    }

    /// Creates a rollback failure.
    #[must_use]
    pub fn rollback_failed(reason: impl Into<String>) -> Self {
        Self::RollbackFailed {
            reason: reason.into(),
        }
    }

    /// Whether a statement timed out, leaving its effect on the warehouse
    /// unknown.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::GatewayExecution(GatewayError::Timeout { .. }))
    }

    /// Returns a short label suitable for metrics and the operation log.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::GatewayExecution(_) => "gateway_execution",
            Self::RowCountUnavailable { .. } => "row_count_unavailable",
            Self::RowCountMismatch { .. } => "row_count_mismatch",
            Self::SchemaFetch { .. } => "schema_fetch",
            Self::SchemaMalformed { .. } => "schema_malformed",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Core(_) => "invalid_input",
        }
    }
}
