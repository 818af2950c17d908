//! Pre-built warehouse fixtures for common test scenarios.

use crate::gateway::ScriptedGateway;

/// `SHOW CREATE TABLE sales.orders` as beeline prints it.
pub const ORDERS_DDL: &str = r#"CREATE TABLE `sales.orders`(
"  `id` bigint, "
"  `amount` decimal(10,2), "
"  `note` string)"
PARTITIONED BY (
"  `d` string)"
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
LOCATION
  'hdfs://nn:8020/warehouse/sales.db/orders'
TBLPROPERTIES (
  'transient_lastDdlTime'='1700000000')"#;

/// `SHOW CREATE TABLE` of a table with two partition columns.
pub const EVENTS_DDL: &str = r#"CREATE TABLE `sales.events`(
"  `event_id` string, "
"  `payload` string)"
PARTITIONED BY (
"  `d` string, "
"  `region` string)"
ROW FORMAT SERDE
  'org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe'"#;

/// `SHOW CREATE TABLE` of an unpartitioned table.
pub const UNPARTITIONED_DDL: &str = r#"CREATE TABLE `sales.lookup`(
"  `code` string, "
"  `label` string)"
ROW FORMAT SERDE
  'org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe'"#;

/// `DESCRIBE FORMATTED` output for a part2 table.
#[must_use]
pub fn formatted_description(location: &str) -> String {
    format!(
        "# Detailed Table Information|NULL|NULL\nDatabase:|sales|NULL\nLocation:|{location}|NULL\nTable Type:|EXTERNAL_TABLE|NULL\n"
    )
}

/// A gateway serving `sales.<table>` with `ddl` and `partitions`, plus the
/// part2 table's location.
///
/// Row counts are left to the test.
#[must_use]
pub fn warehouse_with_table(table: &str, ddl: &str, partitions: &[&str]) -> ScriptedGateway {
    let gateway = ScriptedGateway::new();
    gateway.respond(format!("SHOW CREATE TABLE sales.{table}"), ddl);
    gateway.respond(format!("SHOW PARTITIONS sales.{table}"), partitions.join("\n"));
    gateway.respond(
        format!("USE sales; DESCRIBE FORMATTED {table}_part2"),
        formatted_description(&format!("hdfs://nn:8020/warehouse/sales.db/{table}_part2")),
    );
    gateway
}

/// `sales.orders` with the given daily partitions.
#[must_use]
pub fn orders_warehouse(partitions: &[&str]) -> ScriptedGateway {
    warehouse_with_table("orders", ORDERS_DDL, partitions)
}
