//! coldstore - command-line interface for two-phase partition archival.
//!
//! The main entry point for the `coldstore` CLI binary.

use anyhow::Result;
use clap::Parser;

use coldstore_cli::{Cli, Commands};
use coldstore_core::init_logging;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logging(cli.log_format.into());
    let config = cli.config();

    // Statements run strictly one after another; one thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Archive(args) => coldstore_cli::commands::archive::execute(args, &config).await,
            Commands::DeriveSchema(args) => {
                coldstore_cli::commands::derive_schema::execute(args, &config).await
            }
            Commands::Partitions(args) => {
                coldstore_cli::commands::partitions::execute(args, &config).await
            }
            Commands::ExportLog(args) => {
                coldstore_cli::commands::export_log::execute(args, &config).await
            }
        }
    })
}
