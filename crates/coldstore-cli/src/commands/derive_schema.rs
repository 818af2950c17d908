//! Derive-schema command - print the part2 table definition for a table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use coldstore_archive::query::show_create_query;
use coldstore_archive::{DerivedSchema, WarehouseGateway, derive_target_schema};

use crate::{Config, OutputFormat};

/// Arguments for the derive-schema command.
#[derive(Debug, Args)]
pub struct DeriveSchemaArgs {
    /// Source table (`database.table`).
    #[arg(long)]
    pub source: String,

    /// Part2 table name (default: source with `_part2` appended).
    #[arg(long)]
    pub target: Option<String>,

    /// Read the `SHOW CREATE TABLE` dump from a file instead of the warehouse.
    #[arg(long)]
    pub ddl_file: Option<PathBuf>,
}

impl DeriveSchemaArgs {
    /// The part2 table name.
    #[must_use]
    pub fn target_table(&self) -> String {
        self.target
            .clone()
            .unwrap_or_else(|| format!("{}_part2", self.source))
    }
}

/// Execute the derive-schema command.
///
/// # Errors
///
/// Returns an error if the dump cannot be read or transformed.
pub async fn execute(args: DeriveSchemaArgs, config: &Config) -> Result<()> {
    let dump = match &args.ddl_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => config
            .gateway()?
            .fetch_rows(&show_create_query(&args.source))
            .await
            .with_context(|| format!("failed to fetch creation statement for {}", args.source))?,
    };

    let schema = derive_target_schema(&dump, &args.target_table())?;
    println!("{}", render(&schema, &config.format)?);
    Ok(())
}

/// Renders a derived schema.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(schema: &DerivedSchema, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(schema)?),
        OutputFormat::Text | OutputFormat::Table => Ok(format!(
            "{}\n\nColumns: {}",
            schema.create_statement,
            schema.columns.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use coldstore_test_utils::ORDERS_DDL;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DeriveSchemaArgs,
    }

    #[test]
    fn test_target_defaults_to_part2_suffix() {
        let cli = TestCli::parse_from(["test", "--source", "sales.orders"]);
        assert_eq!(cli.args.target_table(), "sales.orders_part2");

        let cli = TestCli::parse_from(["test", "--source", "sales.orders", "--target", "arch.o"]);
        assert_eq!(cli.args.target_table(), "arch.o");
    }

    #[test]
    fn test_render_text_and_json() {
        let schema = derive_target_schema(ORDERS_DDL, "sales.orders_part2").unwrap();

        let text = render(&schema, &OutputFormat::Text).unwrap();
        assert!(text.starts_with("CREATE EXTERNAL TABLE IF NOT EXISTS sales.orders_part2 ("));
        assert!(text.ends_with("Columns: id, amount, note"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&schema, &OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["columns"][2], "note");
    }

    #[tokio::test]
    async fn test_execute_from_ddl_file() {
        let path = std::env::temp_dir().join(format!("coldstore-ddl-{}.sql", std::process::id()));
        std::fs::write(&path, ORDERS_DDL).unwrap();
        let args = DeriveSchemaArgs {
            source: "sales.orders".to_string(),
            target: None,
            ddl_file: Some(path.clone()),
        };

        // No JDBC URL configured: the file must be enough.
        execute(args, &Config::default()).await.unwrap();
        std::fs::remove_file(path).unwrap();
    }
}
