//! Query text for the warehouse.
//!
//! Every statement the engine issues is built here so that quoting rules live
//! in one place: column names are backtick-quoted, values are single-quoted
//! with `\` and `'` escaped. Table names are passed through as `db.table`.

use coldstore_core::PartitionKey;

use crate::schema::PART2_INSERTION_TIME_COLUMN;

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Quotes a column identifier.
#[must_use]
pub fn quote_ident(column: &str) -> String {
    format!("`{}`", column.replace('`', "``"))
}

/// Builds the `WHERE` condition selecting one partition.
///
/// ```rust
/// use coldstore_archive::query::partition_condition;
/// use coldstore_core::PartitionKey;
///
/// let key = PartitionKey::parse_name("d=2024-01-01/region=us").unwrap();
/// assert_eq!(
///     partition_condition(&key),
///     "`d` = '2024-01-01' AND `region` = 'us'"
/// );
/// ```
#[must_use]
pub fn partition_condition(key: &PartitionKey) -> String {
    key.iter()
        .map(|(column, value)| format!("{} = {}", quote_ident(column), quote_literal(value)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Narrows a partition condition to rows written by one archival batch.
#[must_use]
pub fn part2_condition(key: &PartitionKey, insertion_time: &str) -> String {
    format!(
        "{} AND {} = {}",
        partition_condition(key),
        quote_ident(PART2_INSERTION_TIME_COLUMN),
        quote_literal(insertion_time)
    )
}

/// Builds a `PARTITION (...)` spec body, optionally with the insertion time.
#[must_use]
pub fn partition_spec(key: &PartitionKey, insertion_time: Option<&str>) -> String {
    key.iter()
        .chain(insertion_time.map(|ts| (PART2_INSERTION_TIME_COLUMN, ts)))
        .map(|(column, value)| format!("{}={}", quote_ident(column), quote_literal(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT COUNT(*)` over a table, optionally filtered.
#[must_use]
pub fn count_query(table: &str, condition: Option<&str>) -> String {
    match condition {
        Some(condition) => format!("SELECT COUNT(*) FROM {table} WHERE {condition}"),
        None => format!("SELECT COUNT(*) FROM {table}"),
    }
}

/// Retrieves a table's creation statement.
#[must_use]
pub fn show_create_query(table: &str) -> String {
    format!("SHOW CREATE TABLE {table}")
}

/// Lists a table's partitions.
#[must_use]
pub fn show_partitions_query(database: &str, table: &str) -> String {
    format!("SHOW PARTITIONS {database}.{table}")
}

/// Describes a table's columns.
#[must_use]
pub fn describe_query(table: &str) -> String {
    format!("DESCRIBE {table}")
}

/// Describes a table including storage details such as its location.
#[must_use]
pub fn describe_formatted_query(table: &str, database: &str) -> String {
    format!("USE {database}; DESCRIBE FORMATTED {table}")
}

/// Copies one partition of `source` into `target` under the batch's insertion
/// time partition.
#[must_use]
pub fn insert_partition_statement(
    target: &str,
    source: &str,
    key: &PartitionKey,
    columns: &[String],
    insertion_time: &str,
) -> String {
    let select_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO TABLE {target} PARTITION ({}) SELECT {select_list} FROM {source} WHERE {}",
        partition_spec(key, Some(insertion_time)),
        partition_condition(key),
    )
}

/// Drops one partition (all of its rows) from a table.
#[must_use]
pub fn drop_partition_statement(table: &str, spec: &str, purge: bool) -> String {
    let purge = if purge { " PURGE" } else { "" };
    format!("ALTER TABLE {table} DROP IF EXISTS PARTITION ({spec}){purge}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PartitionKey {
        PartitionKey::parse_name("d=2024-01-01/region=us").unwrap()
    }

    #[test]
    fn literals_escape_quotes_and_backslashes() {
        assert_eq!(quote_literal("o'brien"), r"'o\'brien'");
        assert_eq!(quote_literal(r"a\b"), r"'a\\b'");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn insert_statement_uses_static_partition_spec() {
        let stmt = insert_partition_statement(
            "db.orders_part2",
            "db.orders",
            &key(),
            &["id".to_string(), "amount".to_string()],
            "20261019120000",
        );
        assert_eq!(
            stmt,
            "INSERT INTO TABLE db.orders_part2 PARTITION (`d`='2024-01-01', `region`='us', \
             `part2_insertion_time_partition`='20261019120000') SELECT `id`, `amount` \
             FROM db.orders WHERE `d` = '2024-01-01' AND `region` = 'us'"
        );
    }

    #[test]
    fn drop_statement_optionally_purges() {
        let spec = partition_spec(&key(), None);
        assert_eq!(
            drop_partition_statement("db.orders", &spec, false),
            "ALTER TABLE db.orders DROP IF EXISTS PARTITION (`d`='2024-01-01', `region`='us')"
        );
        assert!(drop_partition_statement("db.orders", &spec, true).ends_with(") PURGE"));
    }

    #[test]
    fn count_query_with_and_without_condition() {
        assert_eq!(count_query("db.t", None), "SELECT COUNT(*) FROM db.t");
        assert_eq!(
            count_query("db.t", Some("`d` = '1'")),
            "SELECT COUNT(*) FROM db.t WHERE `d` = '1'"
        );
    }

    #[test]
    fn part2_condition_adds_insertion_time() {
        assert_eq!(
            part2_condition(&key(), "ts1"),
            "`d` = '2024-01-01' AND `region` = 'us' AND `part2_insertion_time_partition` = 'ts1'"
        );
    }
}
