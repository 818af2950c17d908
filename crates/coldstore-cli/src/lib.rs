//! # coldstore-cli
//!
//! Command-line interface for two-phase partition archival.
//!
//! ## Commands
//!
//! - `coldstore archive` - Move selected partitions from part1 to part2 tables
//! - `coldstore derive-schema` - Print the part2 table definition for a table
//! - `coldstore partitions` - List the partitions a selector picks
//! - `coldstore export-log` - Print the operation log rows of one run
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `COLDSTORE_JDBC_URL` - Warehouse JDBC URL passed to beeline
//! - `COLDSTORE_BEELINE_BIN` - beeline executable (default: `beeline`)
//! - `COLDSTORE_STATEMENT_TIMEOUT_SECS` - Per-statement timeout, `0` for none

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use coldstore_archive::config::timeout_from_secs;
use coldstore_archive::{BeelineGateway, GatewayConfig, WarehouseConnection};
use coldstore_core::LogFormat;

/// coldstore - two-phase partition archival for Hive tables.
#[derive(Debug, Parser)]
#[command(name = "coldstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Warehouse JDBC URL.
    #[arg(long, env = "COLDSTORE_JDBC_URL", hide_env_values = true)]
    pub jdbc_url: Option<String>,

    /// beeline executable.
    #[arg(long, env = "COLDSTORE_BEELINE_BIN", default_value = "beeline")]
    pub beeline_bin: String,

    /// Kill statements running longer than this many seconds (0 = never).
    #[arg(long, env = "COLDSTORE_STATEMENT_TIMEOUT_SECS", default_value = "0")]
    pub statement_timeout_secs: u64,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log format (logs go to stderr).
    #[arg(long, env = "COLDSTORE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            jdbc_url: self.jdbc_url.clone(),
            beeline_bin: self.beeline_bin.clone(),
            statement_timeout: timeout_from_secs(self.statement_timeout_secs),
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move selected partitions from part1 to part2 tables.
    Archive(commands::archive::ArchiveArgs),
    /// Print the part2 table definition derived from a table.
    DeriveSchema(commands::derive_schema::DeriveSchemaArgs),
    /// List the partitions a selector picks.
    Partitions(commands::partitions::PartitionsArgs),
    /// Print the operation log rows of one run.
    ExportLog(commands::export_log::ExportLogArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// Log format flag.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Pretty-printed logs.
    #[default]
    Pretty,
    /// JSON structured logs.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI configuration.
#[derive(Clone, Default)]
pub struct Config {
    /// Warehouse JDBC URL.
    pub jdbc_url: Option<String>,
    /// beeline executable.
    pub beeline_bin: String,
    /// Per-statement timeout.
    pub statement_timeout: Option<Duration>,
    /// Output format.
    pub format: OutputFormat,
}

impl Config {
    /// Builds the beeline gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if no JDBC URL is configured or it is not a `jdbc:` URL.
    pub fn gateway(&self) -> Result<BeelineGateway> {
        let url = self
            .jdbc_url
            .as_deref()
            .context("JDBC URL is required. Set COLDSTORE_JDBC_URL or use --jdbc-url")?;
        let connection = WarehouseConnection::new(url)?;
        let mut gateway = GatewayConfig::new(connection);
        gateway.beeline_bin.clone_from(&self.beeline_bin);
        gateway.statement_timeout = self.statement_timeout;
        Ok(BeelineGateway::new(gateway))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "jdbc_url",
                &self.jdbc_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("beeline_bin", &self.beeline_bin)
            .field("statement_timeout", &self.statement_timeout)
            .field("format", &self.format)
            .finish()
    }
}
