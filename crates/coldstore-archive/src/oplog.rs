//! Operation log: one warehouse row per partition outcome.
//!
//! Rows are appended with `INSERT INTO TABLE <log> VALUES (...)` and read back
//! by batch id. Writes are best effort; a failed append is logged and never
//! changes the outcome it describes.

use serde::Serialize;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::WarehouseGateway;
use crate::outcome::PartitionOutcome;
use crate::query::{quote_ident, quote_literal};

/// Columns of the operation log table, in storage order.
pub const LOG_COLUMNS: [(&str, &str); 10] = [
    ("batch_id", "string"),
    ("table_name", "string"),
    ("partition_name", "string"),
    ("inserted_to_part2", "boolean"),
    ("deleted_from_part1", "boolean"),
    ("rollback_required", "boolean"),
    ("rollback_succeeded", "boolean"),
    ("source_rows", "bigint"),
    ("error", "string"),
    ("logged_at", "string"),
];

/// An operation log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLog {
    table: String,
}

impl OperationLog {
    /// Creates a handle for the `db.table` log table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// The log table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `CREATE TABLE IF NOT EXISTS` for the log table.
    #[must_use]
    pub fn create_statement(&self) -> String {
        let columns = LOG_COLUMNS
            .iter()
            .map(|(name, ty)| format!("{} {ty}", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({columns})", self.table)
    }

    /// Builds the row appended for one partition outcome.
    #[must_use]
    pub fn insert_statement(
        &self,
        batch_id: Uuid,
        table: &str,
        outcome: &PartitionOutcome,
        logged_at: &str,
    ) -> String {
        let source_rows = outcome
            .source_rows()
            .map_or_else(|| "NULL".to_string(), |rows| rows.to_string());
        let error = outcome
            .error()
            .map_or_else(|| "NULL".to_string(), |e| quote_literal(&log_text(&e.to_string())));
        format!(
            "INSERT INTO TABLE {} VALUES ({}, {}, {}, {}, {}, {}, {}, {source_rows}, {error}, {})",
            self.table,
            quote_literal(&batch_id.to_string()),
            quote_literal(table),
            quote_literal(&outcome.partition().to_string()),
            outcome.inserted_to_part2(),
            outcome.deleted_from_part1(),
            outcome.rollback_required(),
            outcome.rollback_succeeded(),
            quote_literal(logged_at),
        )
    }

    /// Reads back every row of one batch.
    #[must_use]
    pub fn fetch_query(&self, batch_id: &str) -> String {
        let columns = LOG_COLUMNS
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {columns} FROM {} WHERE `batch_id` = {} ORDER BY `table_name`, `partition_name`",
            self.table,
            quote_literal(batch_id)
        )
    }

    /// Appends one outcome. Failures are logged and swallowed.
    pub async fn append<G: WarehouseGateway + ?Sized>(
        &self,
        gateway: &G,
        batch_id: Uuid,
        table: &str,
        outcome: &PartitionOutcome,
        logged_at: &str,
    ) {
        let statement = self.insert_statement(batch_id, table, outcome, logged_at);
        if let Err(err) = gateway.execute_statement(&statement).await {
            tracing::warn!(
                log_table = %self.table,
                table,
                partition = %outcome.partition(),
                error = %err,
                "failed to write operation log row"
            );
        }
    }

    /// Fetches and parses the rows of one batch.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the query fails.
    pub async fn fetch<G: WarehouseGateway + ?Sized>(
        &self,
        gateway: &G,
        batch_id: &str,
    ) -> Result<Vec<LogRecord>, GatewayError> {
        let output = gateway.fetch_rows(&self.fetch_query(batch_id)).await?;
        Ok(parse_log_rows(&output))
    }
}

/// Flattens failure text onto one line without `|`, so the row reads back as a
/// single DSV record.
#[must_use]
pub fn log_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
        .replace('|', "/")
}

/// One row of the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Run that wrote the row.
    pub batch_id: String,
    /// Source table.
    pub table_name: String,
    /// Partition name.
    pub partition_name: String,
    /// Copied into part2.
    pub inserted_to_part2: bool,
    /// Removed from part1.
    pub deleted_from_part1: bool,
    /// Part2 copy needed undoing.
    pub rollback_required: bool,
    /// Part2 copy was undone.
    pub rollback_succeeded: bool,
    /// Part1 row count before the copy.
    pub source_rows: Option<u64>,
    /// Failure text, if any.
    pub error: Option<String>,
    /// When the row was written.
    pub logged_at: String,
}

/// Parses `|`-delimited log rows; rows with the wrong arity are skipped.
///
/// The error column is the only one that may contain `|`, so a row with extra
/// fields has them folded back into it.
#[must_use]
pub fn parse_log_rows(output: &str) -> Vec<LogRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_log_row)
        .collect()
}

fn parse_log_row(line: &str) -> Option<LogRecord> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < LOG_COLUMNS.len() {
        tracing::debug!(line, "skipping malformed operation log row");
        return None;
    }
    let error_end = fields.len() - 1;
    let error = fields[8..error_end].join("|");
    Some(LogRecord {
        batch_id: fields[0].trim().to_string(),
        table_name: fields[1].trim().to_string(),
        partition_name: fields[2].trim().to_string(),
        inserted_to_part2: parse_flag(fields[3]),
        deleted_from_part1: parse_flag(fields[4]),
        rollback_required: parse_flag(fields[5]),
        rollback_succeeded: parse_flag(fields[6]),
        source_rows: fields[7].trim().parse().ok(),
        error: non_null(&error),
        logged_at: fields[error_end].trim().to_string(),
    })
}

fn parse_flag(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case("true")
}

fn non_null(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty() && !field.eq_ignore_ascii_case("NULL")).then(|| field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::outcome::PartitionState;
    use coldstore_core::PartitionKey;

    fn moved() -> PartitionOutcome {
        let mut o = PartitionOutcome::new(PartitionKey::parse_name("d=2024-01-01").unwrap());
        o.record_source_rows(100);
        o.advance(PartitionState::Inserted).unwrap();
        o.advance(PartitionState::Moved).unwrap();
        o
    }

    #[test]
    fn insert_statement_carries_flags_and_nulls() {
        let log = OperationLog::new("ops.archival_operation_log");
        let stmt = log.insert_statement(Uuid::nil(), "sales.orders", &moved(), "2024-02-01T00:00:00Z");
        assert_eq!(
            stmt,
            "INSERT INTO TABLE ops.archival_operation_log VALUES (\
             '00000000-0000-0000-0000-000000000000', 'sales.orders', 'd=2024-01-01', \
             true, true, false, false, 100, NULL, '2024-02-01T00:00:00Z')"
        );
    }

    #[test]
    fn insert_statement_quotes_error_text() {
        let log = OperationLog::new("ops.log");
        let mut o = PartitionOutcome::new(PartitionKey::parse_name("d=x").unwrap());
        o.record_error(ArchiveError::schema_malformed("it's broken"));
        let stmt = log.insert_statement(Uuid::nil(), "db.t", &o, "now");
        assert!(stmt.contains(r"'malformed creation statement: it\'s broken'"));
        assert!(stmt.contains("false, false, false, false, NULL,"));
    }

    #[test]
    fn multi_line_errors_read_back_as_one_row() {
        let log = OperationLog::new("ops.log");
        let mut o = PartitionOutcome::new(PartitionKey::parse_name("d=2024-01-01").unwrap());
        o.record_source_rows(5);
        o.advance(PartitionState::Inserted).unwrap();
        o.record_error(ArchiveError::GatewayExecution(GatewayError::execution(
            "ALTER TABLE db.t DROP IF EXISTS PARTITION (`d`='2024-01-01')",
            "Error: org.apache.hive.service.cli.HiveSQLException\n\tat a|b\r\n",
        )));
        let stmt = log.insert_statement(Uuid::nil(), "db.t", &o, "now");
        let stored = log_text(&o.error().unwrap().to_string());
        assert!(!stored.contains(['\n', '\r', '|']));
        assert!(stmt.contains(&quote_literal(&stored)));

        let row = format!("b1|db.t|d=2024-01-01|true|false|false|false|5|{stored}|now\n");
        let rows = parse_log_rows(&row);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].error.as_deref(), Some(stored.as_str()));
        assert!(stored.contains("HiveSQLException / at a/b"));
    }

    #[test]
    fn create_statement_lists_every_column() {
        let stmt = OperationLog::new("ops.log").create_statement();
        assert!(stmt.starts_with("CREATE TABLE IF NOT EXISTS ops.log (`batch_id` string"));
        assert!(stmt.ends_with("`logged_at` string)"));
    }

    #[test]
    fn rows_parse_and_fold_pipes_into_error() {
        let output = "\
b1|sales.orders|d=2024-01-01|true|true|false|false|100|NULL|2024-02-01T00:00:00Z
b1|sales.orders|d=2024-01-02|true|false|true|true|7|drop failed|exit 1|2024-02-01T00:00:01Z
short|row
";
        let rows = parse_log_rows(output);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_rows, Some(100));
        assert_eq!(rows[0].error, None);
        assert!(rows[1].rollback_succeeded);
        assert_eq!(rows[1].error.as_deref(), Some("drop failed|exit 1"));
        assert_eq!(rows[1].logged_at, "2024-02-01T00:00:01Z");
    }
}
