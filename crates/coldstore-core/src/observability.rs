//! Observability infrastructure for coldstore.
//!
//! Structured logging with consistent spans. The engine logs every step of a
//! partition's move inside a `partition` span nested in an `archive` span, so a
//! JSON log line always carries the table and partition it belongs to.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for scheduled runs).
    Json,
    /// Pretty-printed logs (for interactive use).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `coldstore_archive=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
        };
        // A subscriber installed by the host process (e.g. tests) wins.
        let _ = result;
    });
}

/// Creates a span for table-level archival operations.
#[must_use]
pub fn archive_span(operation: &str, table: &str) -> Span {
    tracing::info_span!("archive", op = operation, table = table)
}

/// Creates a span for a single partition's move.
#[must_use]
pub fn partition_span(table: &str, partition: &str) -> Span {
    tracing::info_span!("partition", table = table, partition = partition)
}
