//! Archive command - move selected partitions into part2 tables.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use owo_colors::OwoColorize;
use serde::Serialize;

use coldstore_archive::metrics::describe_metrics;
use coldstore_archive::{
    ArchivalConfig, ArchivalEngine, ArchivalState, ArchivalSummary, PartitionState, summarize,
};

use super::{KeyValue, format_state_colored, selector};
use crate::{Config, OutputFormat};

/// Arguments for the archive command.
#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Database holding the part1 tables.
    #[arg(long)]
    pub database: String,

    /// Table to archive (repeatable).
    #[arg(long = "table", required = true)]
    pub tables: Vec<String>,

    /// Database for part2 tables (default: the source database).
    #[arg(long)]
    pub part2_database: Option<String>,

    /// Suffix appended to part2 table names.
    #[arg(long, default_value = "_part2")]
    pub part2_suffix: String,

    /// Only archive partitions where column=value (repeatable).
    #[arg(long = "match", value_parser = KeyValue::from_str)]
    pub matches: Vec<KeyValue>,

    /// Only archive partitions whose column sorts before value.
    #[arg(long, value_parser = KeyValue::from_str)]
    pub before: Option<KeyValue>,

    /// Process at most this many partitions per table, oldest first.
    #[arg(long)]
    pub max_partitions: Option<usize>,

    /// Drop part1 partitions with PURGE.
    #[arg(long)]
    pub purge: bool,

    /// Derive, list and count without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Table receiving one row per partition outcome.
    #[arg(long, env = "COLDSTORE_OPERATION_LOG_TABLE")]
    pub operation_log_table: Option<String>,

    /// Roll back without first checking part1 still holds the partition.
    #[arg(long)]
    pub skip_part1_check: bool,

    /// Write Prometheus metrics to this file when the run ends.
    #[arg(long)]
    pub metrics_textfile: Option<PathBuf>,
}

impl ArchiveArgs {
    /// Archival configuration for these arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the combination is invalid.
    pub fn archival_config(&self) -> Result<ArchivalConfig> {
        let config = ArchivalConfig {
            part2_database: self.part2_database.clone(),
            part2_suffix: self.part2_suffix.clone(),
            purge: self.purge,
            dry_run: self.dry_run,
            max_partitions_per_table: self.max_partitions,
            verify_part1_before_rollback: !self.skip_part1_check,
            operation_log_table: self.operation_log_table.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Execute the archive command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, output cannot be
/// written, or any partition ends with a failed rollback.
pub async fn execute(args: ArchiveArgs, config: &Config) -> Result<()> {
    let archival = args.archival_config()?;
    let gateway = config.gateway()?;
    let metrics = args.metrics_textfile.as_ref().map(|_| install_metrics()).transpose()?;

    let selector = selector(&args.matches, args.before.as_ref());
    let engine = ArchivalEngine::new(gateway, archival);
    tracing::info!(batch_id = %engine.batch_id(), "archival batch");
    let state = engine
        .run(&args.database, &args.tables, &selector, Utc::now())
        .await;
    let summary = summarize(&state);

    println!("{}", render(&summary, &state, &config.format)?);

    if let (Some(path), Some(handle)) = (&args.metrics_textfile, &metrics) {
        std::fs::write(path, handle.render())
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    if summary.rollback_failures > 0 {
        anyhow::bail!(
            "{} partition(s) could not be rolled back and need manual intervention (batch {})",
            summary.rollback_failures,
            summary.batch_id
        );
    }
    Ok(())
}

fn install_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;
    describe_metrics();
    Ok(handle)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a ArchivalSummary,
    state: &'a ArchivalState,
}

/// Renders the run report.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(
    summary: &ArchivalSummary,
    state: &ArchivalState,
    format: &OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport { summary, state })?),
        OutputFormat::Text => Ok(render_text(summary, state)),
        OutputFormat::Table => Ok(render_table(summary, state)),
    }
}

fn render_text(summary: &ArchivalSummary, state: &ArchivalState) -> String {
    let (tables, overall) = summary.lines();
    let mut out = tables;
    let unfinished: Vec<_> = state
        .outcomes()
        .filter(|(_, o)| o.state() != PartitionState::Moved)
        .collect();
    if !unfinished.is_empty() {
        out.push(String::new());
        out.push("Partitions not moved:".to_string());
        for (table, outcome) in unfinished {
            out.push(format!(
                "  {table} {} {}",
                outcome.partition(),
                format_state_colored(&outcome.state().to_string())
            ));
            if let Some(error) = outcome.error() {
                out.push(format!("    Error: {}", error.to_string().red()));
            }
        }
        out.push(String::new());
    }
    out.push(overall);
    out.join("\n")
}

fn render_table(summary: &ArchivalSummary, state: &ArchivalState) -> String {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct PartitionRow {
        #[tabled(rename = "Table")]
        table: String,
        #[tabled(rename = "Partition")]
        partition: String,
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "Rows")]
        rows: String,
        #[tabled(rename = "Error")]
        error: String,
    }

    let rows: Vec<_> = state
        .outcomes()
        .map(|(table, o)| PartitionRow {
            table: table.to_string(),
            partition: o.partition().to_string(),
            state: o.state().to_string(),
            rows: o.source_rows().map_or_else(|| "-".to_string(), |r| r.to_string()),
            error: o.error().map(ToString::to_string).unwrap_or_default(),
        })
        .collect();

    let mut out = Vec::new();
    if rows.is_empty() {
        out.push("No partitions processed".to_string());
    } else {
        out.push(Table::new(rows).to_string());
    }
    for table in summary.tables.iter().filter(|t| t.error.is_some()) {
        out.push(table.line());
    }
    out.push(summary.overall_line());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use coldstore_archive::outcome::PartitionOutcome;
    use coldstore_core::PartitionKey;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ArchiveArgs,
    }

    fn moved_state() -> ArchivalState {
        let mut state = ArchivalState::new(Default::default(), "20240201000000");
        let mut o = PartitionOutcome::new(PartitionKey::parse_name("d=2024-01-01").unwrap());
        o.record_source_rows(100);
        o.advance(PartitionState::Inserted).unwrap();
        o.advance(PartitionState::Moved).unwrap();
        o.finish();
        state.table_mut("sales.orders").record(o);
        state
    }

    #[test]
    fn test_archive_args_parsing() {
        let cli = TestCli::parse_from([
            "test",
            "--database",
            "sales",
            "--table",
            "orders",
            "--table",
            "returns",
            "--match",
            "region=us",
            "--before",
            "d=2024-01-01",
            "--max-partitions",
            "30",
            "--purge",
            "--skip-part1-check",
        ]);
        assert_eq!(cli.args.tables, vec!["orders", "returns"]);
        assert_eq!(cli.args.matches.len(), 1);
        assert_eq!(cli.args.before.as_ref().map(|kv| kv.value.as_str()), Some("2024-01-01"));

        let config = cli.args.archival_config().unwrap();
        assert_eq!(config.max_partitions_per_table, Some(30));
        assert!(config.purge);
        assert!(!config.verify_part1_before_rollback);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_archive_args_reject_invalid_config() {
        let cli = TestCli::parse_from([
            "test", "--database", "sales", "--table", "orders", "--part2-suffix", "",
        ]);
        assert!(cli.args.archival_config().is_err());
    }

    #[test]
    fn test_archive_requires_a_table() {
        assert!(TestCli::try_parse_from(["test", "--database", "sales"]).is_err());
    }

    #[test]
    fn test_text_report_ends_with_overall_line() {
        let state = moved_state();
        let summary = summarize(&state);
        let text = render(&summary, &state, &OutputFormat::Text).unwrap();
        assert!(text.starts_with("Table: sales.orders: Partitions: Inserted to Part2: 1"));
        assert!(text.ends_with(&summary.overall_line()));
        assert!(!text.contains("Partitions not moved"));
    }

    #[test]
    fn test_json_report_carries_states() {
        let state = moved_state();
        let summary = summarize(&state);
        let json: serde_json::Value =
            serde_json::from_str(&render(&summary, &state, &OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["summary"]["totals"]["deleted_from_part1"], 1);
        assert_eq!(
            json["state"]["tables"]["sales.orders"]["partitions"]["d=2024-01-01"]["state"],
            "MOVED"
        );
    }

    #[test]
    fn test_table_report_lists_partitions() {
        let state = moved_state();
        let summary = summarize(&state);
        let table = render(&summary, &state, &OutputFormat::Table).unwrap();
        assert!(table.contains("d=2024-01-01"));
        assert!(table.contains("MOVED"));
        assert!(table.contains("100"));
    }
}
