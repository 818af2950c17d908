//! Archival metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! installs a recorder (the CLI can write a Prometheus textfile).
//! - Partition outcomes by table and final state
//! - Rollbacks by table and result
//! - Gateway call latency by call kind and result

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::outcome::PartitionState;

/// Partitions reaching a final state, by table and state.
pub const PARTITIONS_TOTAL: &str = "coldstore_partitions_total";

/// Rows copied into part2 tables.
pub const ROWS_ARCHIVED_TOTAL: &str = "coldstore_rows_archived_total";

/// Tables that could not be prepared for archival.
pub const TABLE_FAILURES_TOTAL: &str = "coldstore_table_failures_total";

/// Gateway call duration in seconds.
pub const GATEWAY_CALL_DURATION: &str = "coldstore_gateway_call_duration_seconds";

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        PARTITIONS_TOTAL,
        "Partitions reaching a final state, by table and state"
    );
    describe_counter!(ROWS_ARCHIVED_TOTAL, "Rows copied into part2 tables");
    describe_counter!(
        TABLE_FAILURES_TOTAL,
        "Tables whose part2 table could not be prepared"
    );
    describe_histogram!(GATEWAY_CALL_DURATION, "Duration of query engine calls");
}

/// Records a partition's final state.
pub fn record_partition(table: &str, state: PartitionState, rows: Option<u64>) {
    counter!(
        PARTITIONS_TOTAL,
        "table" => table.to_string(),
        "state" => state.as_label()
    )
    .increment(1);
    if state == PartitionState::Moved {
        if let Some(rows) = rows {
            counter!(ROWS_ARCHIVED_TOTAL, "table" => table.to_string()).increment(rows);
        }
    }
}

/// Records a table that failed before any partition was processed.
pub fn record_table_failure(table: &str, reason: &'static str) {
    counter!(
        TABLE_FAILURES_TOTAL,
        "table" => table.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Records one gateway call.
pub fn record_gateway_call(kind: &'static str, result: &'static str, elapsed: Duration) {
    histogram!(GATEWAY_CALL_DURATION, "kind" => kind, "result" => result)
        .record(elapsed.as_secs_f64());
}
