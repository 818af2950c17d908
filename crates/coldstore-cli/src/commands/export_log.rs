//! Export-log command - print the operation log rows of one run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use coldstore_archive::{LogRecord, OperationLog};

use crate::{Config, OutputFormat};

/// Arguments for the export-log command.
#[derive(Debug, Args)]
pub struct ExportLogArgs {
    /// Operation log table (`database.table`).
    #[arg(long, env = "COLDSTORE_OPERATION_LOG_TABLE")]
    pub table: String,

    /// Batch id printed by the archive command.
    #[arg(long)]
    pub batch_id: String,

    /// Also write the rows as CSV to this file.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the export-log command.
///
/// # Errors
///
/// Returns an error if the log cannot be queried or the output written.
pub async fn execute(args: ExportLogArgs, config: &Config) -> Result<()> {
    let gateway = config.gateway()?;
    let log = OperationLog::new(&args.table);
    let records = log
        .fetch(&gateway, &args.batch_id)
        .await
        .with_context(|| format!("failed to read operation log {}", args.table))?;

    if let Some(path) = &args.output {
        std::fs::write(path, to_csv(&records))
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = records.len(), "operation log exported");
    }

    println!("{}", render(&records, &config.format)?);
    Ok(())
}

fn render(records: &[LogRecord], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                return Ok("No operation log rows found".to_string());
            }
            Ok(records
                .iter()
                .map(|r| {
                    format!(
                        "{} {}: inserted={} deleted={} rollback_required={} rollback_succeeded={}{}",
                        r.table_name,
                        r.partition_name,
                        r.inserted_to_part2,
                        r.deleted_from_part1,
                        r.rollback_required,
                        r.rollback_succeeded,
                        r.error
                            .as_ref()
                            .map_or(String::new(), |e| format!(" error={e}"))
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct LogRow {
                #[tabled(rename = "Table")]
                table: String,
                #[tabled(rename = "Partition")]
                partition: String,
                #[tabled(rename = "Inserted")]
                inserted: bool,
                #[tabled(rename = "Deleted")]
                deleted: bool,
                #[tabled(rename = "Rollback Req.")]
                rollback_required: bool,
                #[tabled(rename = "Rolled Back")]
                rollback_succeeded: bool,
                #[tabled(rename = "Logged At")]
                logged_at: String,
            }

            if records.is_empty() {
                return Ok("No operation log rows found".to_string());
            }
            let rows: Vec<_> = records
                .iter()
                .map(|r| LogRow {
                    table: r.table_name.clone(),
                    partition: r.partition_name.clone(),
                    inserted: r.inserted_to_part2,
                    deleted: r.deleted_from_part1,
                    rollback_required: r.rollback_required,
                    rollback_succeeded: r.rollback_succeeded,
                    logged_at: r.logged_at.clone(),
                })
                .collect();
            Ok(Table::new(rows).to_string())
        }
    }
}

/// Renders records as CSV with a header row.
#[must_use]
pub fn to_csv(records: &[LogRecord]) -> String {
    let mut out = String::from(
        "batch_id,table_name,partition_name,inserted_to_part2,deleted_from_part1,rollback_required,rollback_succeeded,source_rows,error,logged_at\n",
    );
    for r in records {
        let fields = [
            csv_field(&r.batch_id),
            csv_field(&r.table_name),
            csv_field(&r.partition_name),
            r.inserted_to_part2.to_string(),
            r.deleted_from_part1.to_string(),
            r.rollback_required.to_string(),
            r.rollback_succeeded.to_string(),
            r.source_rows.map(|n| n.to_string()).unwrap_or_default(),
            csv_field(r.error.as_deref().unwrap_or_default()),
            csv_field(&r.logged_at),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstore_archive::oplog::parse_log_rows;

    fn records() -> Vec<LogRecord> {
        parse_log_rows(
            "b1|sales.orders|d=2024-01-01|true|true|false|false|100|NULL|2024-02-01T00:00:00Z\n\
             b1|sales.orders|d=2024-01-02|true|false|true|false|5|rollback failed: part1 holds 2, not 5|2024-02-01T00:00:01Z\n",
        )
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let csv = to_csv(&records());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("batch_id,table_name"));
        assert_eq!(
            lines[1],
            "b1,sales.orders,d=2024-01-01,true,true,false,false,100,,2024-02-01T00:00:00Z"
        );
        assert!(lines[2].contains(",\"rollback failed: part1 holds 2, not 5\","));
    }

    #[test]
    fn test_render_text_shows_errors() {
        let text = render(&records(), &OutputFormat::Text).unwrap();
        assert!(text.contains("sales.orders d=2024-01-01: inserted=true deleted=true"));
        assert!(text.contains("error=rollback failed"));
        assert_eq!(
            render(&[], &OutputFormat::Text).unwrap(),
            "No operation log rows found"
        );
    }

    #[test]
    fn test_export_log_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: ExportLogArgs,
        }

        let cli = TestCli::parse_from([
            "test",
            "--table",
            "ops.archival_operation_log",
            "--batch-id",
            "0190f6c2-0000-7000-8000-000000000000",
        ]);
        assert_eq!(cli.args.table, "ops.archival_operation_log");
        assert!(cli.args.output.is_none());
    }
}
