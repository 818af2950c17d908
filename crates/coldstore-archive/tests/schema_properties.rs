//! Property tests for part2 schema derivation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;

use coldstore_archive::schema::{PART2_INSERTION_TIME_COLUMN, derive_target_schema};
use proptest::prelude::*;

fn arb_columns(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 1..max)
        .prop_map(|set: BTreeSet<String>| set.into_iter().collect())
}

fn arb_type() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["string", "bigint", "decimal(10,2)", "timestamp", "map<string,int>"])
}

fn column_lines(columns: &[(String, &str)]) -> Vec<String> {
    let last = columns.len() - 1;
    columns
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            if i == last {
                format!("\"  `{name}` {ty})\"")
            } else {
                format!("\"  `{name}` {ty}, \"")
            }
        })
        .collect()
}

fn dump(data: &[(String, &str)], partitions: &[(String, &str)]) -> String {
    let mut lines = vec!["CREATE TABLE `db.t`(".to_string()];
    lines.extend(column_lines(data));
    lines.push("PARTITIONED BY ( ".to_string());
    lines.extend(column_lines(partitions));
    lines.push("ROW FORMAT SERDE ".to_string());
    lines.push("  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'".to_string());
    lines.push("LOCATION".to_string());
    lines.push("  'hdfs://nn/warehouse/db.db/t'".to_string());
    lines.join("\n")
}

fn arb_dump() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        arb_columns(8).prop_flat_map(|cols| {
            let n = cols.len();
            (Just(cols), prop::collection::vec(arb_type(), n))
        }),
        arb_columns(4),
    )
        .prop_map(|((data, types), partitions)| {
            let data_cols: Vec<(String, &str)> =
                data.iter().cloned().zip(types).collect();
            let partition_cols: Vec<(String, &str)> =
                partitions.into_iter().map(|p| (format!("p_{p}"), "string")).collect();
            (dump(&data_cols, &partition_cols), data)
        })
}

proptest! {
    #[test]
    fn data_columns_are_extracted_in_order((dump, data) in arb_dump()) {
        let schema = derive_target_schema(&dump, "db.t_part2").unwrap();
        prop_assert_eq!(schema.columns, data);
    }

    #[test]
    fn derivation_is_deterministic((dump, _) in arb_dump()) {
        let first = derive_target_schema(&dump, "db.t_part2").unwrap();
        let second = derive_target_schema(&dump, "db.t_part2").unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn insertion_time_column_closes_the_partition_clause((dump, _) in arb_dump()) {
        let schema = derive_target_schema(&dump, "db.t_part2").unwrap();
        let expected_end = format!(", {PART2_INSERTION_TIME_COLUMN} string)");
        prop_assert!(schema.create_statement.ends_with(&expected_end));
        prop_assert!(schema
            .create_statement
            .starts_with("CREATE EXTERNAL TABLE IF NOT EXISTS db.t_part2 ("));
        prop_assert!(!schema.create_statement.contains("LOCATION"));
    }

    #[test]
    fn output_never_carries_the_serde_clause(
        before in prop::collection::vec("[a-z`\"(),' ]{0,30}", 0..6),
        after in prop::collection::vec("[ -~]{0,30}", 0..6),
    ) {
        let mut lines = vec!["CREATE TABLE `t`(".to_string()];
        lines.extend(before);
        lines.push("PARTITIONED BY (`d` string)".to_string());
        lines.push("ROW FORMAT SERDE 'x'".to_string());
        lines.extend(after);
        if let Ok(schema) = derive_target_schema(&lines.join("\n"), "t_part2") {
            prop_assert!(!schema.create_statement.contains("ROW FORMAT SERDE"));
        }
    }
}
