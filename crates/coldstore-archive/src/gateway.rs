//! The boundary between the archival core and the query engine.
//!
//! Implementations only need [`WarehouseGateway::execute_statement`] and
//! [`WarehouseGateway::fetch_rows`]; the remaining operations are built on
//! `fetch_rows` and the parsers in this module. An `Err` always means the
//! operation did not take effect as far as the caller can tell; the engine
//! treats every error as a failed step.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::query;

/// Executes statements and queries against the warehouse.
#[async_trait]
pub trait WarehouseGateway: Send + Sync {
    /// Runs a statement, returning `Ok(())` if the engine reported success.
    async fn execute_statement(&self, statement: &str) -> Result<(), GatewayError>;

    /// Runs a query and returns its `|`-delimited, headerless output.
    async fn fetch_rows(&self, query: &str) -> Result<String, GatewayError>;

    /// Counts rows of `table`, optionally filtered by `condition`.
    ///
    /// The reply must be a single non-negative integer; anything else is
    /// [`GatewayError::RowCountUnavailable`].
    async fn fetch_row_count(
        &self,
        table: &str,
        condition: Option<&str>,
    ) -> Result<u64, GatewayError> {
        let reply = self
            .fetch_rows(&query::count_query(table, condition))
            .await
            .map_err(|err| GatewayError::RowCountUnavailable {
                table: table.to_string(),
                reply: err.to_string(),
            })?;
        parse_row_count(table, &reply)
    }

    /// Returns the storage location of `database.table`.
    async fn fetch_table_location(
        &self,
        table: &str,
        database: &str,
    ) -> Result<String, GatewayError> {
        let query = query::describe_formatted_query(table, database);
        let output = self.fetch_rows(&query).await?;
        parse_table_location(&output)
            .ok_or_else(|| GatewayError::execution(query, "no Location row in output"))
    }

    /// Lists the partition names of `database.table`; empty on failure.
    async fn fetch_partition_names(&self, database: &str, table: &str) -> Vec<String> {
        match self
            .fetch_rows(&query::show_partitions_query(database, table))
            .await
        {
            Ok(output) => parse_partition_listing(&output),
            Err(err) => {
                tracing::warn!(database, table, error = %err, "failed to list partitions");
                Vec::new()
            }
        }
    }

    /// Lists the data columns of `table`, skipping `partition_columns`;
    /// empty on failure.
    async fn fetch_columns_excluding_partitions(
        &self,
        table: &str,
        partition_columns: &[String],
    ) -> Vec<String> {
        match self.fetch_rows(&query::describe_query(table)).await {
            Ok(output) => parse_describe_columns(&output)
                .into_iter()
                .filter(|c| !partition_columns.contains(c))
                .collect(),
            Err(err) => {
                tracing::warn!(table, error = %err, "failed to describe table");
                Vec::new()
            }
        }
    }
}

/// Parses a `COUNT(*)` reply.
///
/// # Errors
///
/// Returns [`GatewayError::RowCountUnavailable`] unless the trimmed reply is
/// made only of ASCII digits.
pub fn parse_row_count(table: &str, reply: &str) -> Result<u64, GatewayError> {
    let trimmed = reply.trim();
    let unavailable = || GatewayError::RowCountUnavailable {
        table: table.to_string(),
        reply: reply.to_string(),
    };
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unavailable());
    }
    trimmed.parse().map_err(|_| unavailable())
}

/// Parses `SHOW PARTITIONS` output into partition names.
#[must_use]
pub fn parse_partition_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `DESCRIBE` output into column names.
///
/// Rows are `|`-delimited, with or without a leading `|`; the column name is
/// the first field. Header,
/// section (`#`) and separator (`--`) rows are skipped, which also skips the
/// `# Partition Information` section's repeated partition columns.
#[must_use]
pub fn parse_describe_columns(output: &str) -> Vec<String> {
    let mut columns = Vec::new();
    for line in output.lines() {
        if line.is_empty() || line.contains("col_name") || line.contains('#') || line.contains("--")
        {
            continue;
        }
        let fields = line.strip_prefix('|').unwrap_or(line);
        let Some(name) = fields.split('|').next().map(str::trim) else {
            continue;
        };
        if !name.is_empty() && !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// Finds the `Location:` row of `DESCRIBE FORMATTED` output.
#[must_use]
pub fn parse_table_location(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let line = line.trim().trim_start_matches('|').trim();
        let rest = line.strip_prefix("Location")?;
        let (_, value) = rest.split_once(':')?;
        let value = value.trim().trim_start_matches('|');
        let value = value.split('|').next()?.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_count_must_be_non_negative_integer() {
        assert_eq!(parse_row_count("t", "42\n"), Ok(42));
        assert_eq!(parse_row_count("t", "0"), Ok(0));
        for bad in ["", "  ", "-1", "4.2", "NULL", "12 rows"] {
            assert!(
                matches!(
                    parse_row_count("t", bad),
                    Err(GatewayError::RowCountUnavailable { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn row_count_overflow_is_unavailable() {
        assert!(parse_row_count("t", "99999999999999999999999").is_err());
    }

    #[test]
    fn partition_listing_skips_blank_lines() {
        let names = parse_partition_listing("d=2024-01-01\n\n d=2024-01-02 \n");
        assert_eq!(names, vec!["d=2024-01-01", "d=2024-01-02"]);
    }

    #[test]
    fn describe_columns_skip_partition_section() {
        let output = "\
|col_name|data_type|comment|
|id|bigint||
|amount|decimal(10,2)||
|d|string||
||NULL|NULL|
|# Partition Information|NULL|NULL|
|# col_name|data_type|comment|
|d|string||
";
        assert_eq!(parse_describe_columns(output), vec!["id", "amount", "d"]);
        assert_eq!(parse_describe_columns("id|bigint|\nd|string|\n"), vec!["id", "d"]);
    }

    #[test]
    fn location_is_taken_from_formatted_description() {
        let output = "\
# Detailed Table Information\t\t
Database:           \tsales
Location:           \thdfs://nn:8020/warehouse/sales.db/orders_part2\t
Table Type:         \tEXTERNAL_TABLE
";
        assert_eq!(
            parse_table_location(output).as_deref(),
            Some("hdfs://nn:8020/warehouse/sales.db/orders_part2")
        );
    }

    #[test]
    fn location_is_taken_from_delimited_description() {
        let output = "Database:|sales|NULL\nLocation:|s3a://bucket/orders_part2|NULL\n";
        assert_eq!(
            parse_table_location(output).as_deref(),
            Some("s3a://bucket/orders_part2")
        );
        assert_eq!(parse_table_location("Owner:|hive|NULL"), None);
    }
}
