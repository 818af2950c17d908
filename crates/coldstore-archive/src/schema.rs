//! Part2 table derivation from a `SHOW CREATE TABLE` dump.
//!
//! This is a line-oriented rewrite of the dump beeline prints, not a DDL
//! parser. The dump looks like:
//!
//! ```text
//! CREATE TABLE `sales.orders`(
//! "  `id` bigint, "
//! "  `amount` decimal(10,2))"
//! PARTITIONED BY (
//! "  `d` string)"
//! ROW FORMAT SERDE
//!   'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
//! ...
//! ```
//!
//! Beeline wraps indented lines in double quotes, so on the raw line the
//! column name is the second whitespace-delimited token; once quotes are
//! stripped it is the first. Everything from `ROW FORMAT SERDE` on (SerDe,
//! storage format, location, table properties) is dropped: the part2 table
//! gets the warehouse defaults.

use serde::Serialize;

use crate::error::{ArchiveError, Result};

/// Synthetic partition column appended to every part2 table.
pub const PART2_INSERTION_TIME_COLUMN: &str = "part2_insertion_time_partition";

const SERDE_MARKER: &str = "ROW FORMAT SERDE";
const PARTITIONED_BY: &str = "PARTITIONED BY";

/// A part2 table definition derived from a part1 creation statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedSchema {
    /// The `CREATE EXTERNAL TABLE IF NOT EXISTS` statement for the part2 table.
    pub create_statement: String,
    /// Data column names in declaration order, partition columns excluded.
    pub columns: Vec<String>,
}

/// Derives the part2 table definition from the part1 creation statement.
///
/// # Errors
///
/// Returns [`ArchiveError::SchemaMalformed`] if nothing precedes
/// `ROW FORMAT SERDE`, or the source has no `PARTITIONED BY` clause, or that
/// clause is never closed.
///
/// # Example
///
/// ```rust
/// use coldstore_archive::schema::derive_target_schema;
///
/// let dump = "CREATE TABLE `db.t`(\n\"  `a` string, \"\n\"  `b` string)\"\n\
///             PARTITIONED BY ( \n\"  `d` string)\"\nROW FORMAT SERDE \n  'x'";
/// let schema = derive_target_schema(dump, "db.t_part2").unwrap();
/// assert_eq!(schema.columns, vec!["a", "b"]);
/// assert!(schema.create_statement.ends_with("part2_insertion_time_partition string)"));
/// ```
pub fn derive_target_schema(source: &str, target_table: &str) -> Result<DerivedSchema> {
    let mut lines: Vec<String> = Vec::new();
    let mut columns = Vec::new();
    let mut partition_clause_start = None;

    for raw in source.lines() {
        let ascii: String = raw.chars().filter(char::is_ascii).collect();
        let line = ascii.replace('"', "");
        if raw.contains(SERDE_MARKER) || line.contains(SERDE_MARKER) {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let is_header = lines.is_empty();
        if partition_clause_start.is_none() && line.starts_with(PARTITIONED_BY) {
            partition_clause_start = Some(lines.len());
        }
        if !is_header && partition_clause_start.is_none() {
            if let Some(column) = column_name(line) {
                columns.push(column);
            }
        }
        lines.push(line.to_string());
    }

    if lines.is_empty() {
        return Err(ArchiveError::schema_malformed(
            "no lines precede ROW FORMAT SERDE",
        ));
    }
    let start = partition_clause_start
        .ok_or_else(|| ArchiveError::schema_malformed("source table is not partitioned"))?;
    let (line_idx, byte_idx) = find_clause_close(&lines, start)
        .ok_or_else(|| ArchiveError::schema_malformed("unterminated PARTITIONED BY clause"))?;

    lines[0] = format!("CREATE EXTERNAL TABLE IF NOT EXISTS {target_table} (");
    let closing = &mut lines[line_idx];
    closing.replace_range(
        byte_idx..=byte_idx,
        &format!(", {PART2_INSERTION_TIME_COLUMN} string)"),
    );

    Ok(DerivedSchema {
        create_statement: lines.join(" "),
        columns,
    })
}

/// Column name of a column definition line, if it is one.
fn column_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    // Name and type at minimum.
    tokens.next()?;
    if name == "COMMENT" {
        return None;
    }
    let name = name.trim_end_matches(',').trim_matches('`');
    (!name.is_empty()).then(|| name.to_string())
}

/// Finds the `)` closing the `PARTITIONED BY (` clause that begins on
/// `lines[start]`, skipping parentheses inside quoted comments. Hive escapes
/// quotes inside comments as `\'`.
fn find_clause_close(lines: &[String], start: usize) -> Option<(usize, usize)> {
    let mut depth = 0_u32;
    let mut in_quote = false;
    let mut escaped = false;
    for (line_idx, line) in lines.iter().enumerate().skip(start) {
        let offset = if line_idx == start {
            line.find(PARTITIONED_BY)?
        } else {
            0
        };
        for (byte_idx, c) in line.char_indices().skip_while(|(i, _)| *i < offset) {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_quote => escaped = true,
                '\'' => in_quote = !in_quote,
                '(' if !in_quote => depth += 1,
                ')' if !in_quote && depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((line_idx, byte_idx));
                    }
                }
                _ => {}
            }
        }
    }
    None
}
