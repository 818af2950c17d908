//! Partitions command - list the partitions a selector picks.

use std::str::FromStr;

use anyhow::Result;
use clap::Args;

use coldstore_archive::WarehouseGateway;
use coldstore_core::{Error, PartitionKey, PartitionSelector};

use super::{KeyValue, selector};
use crate::{Config, OutputFormat};

/// Arguments for the partitions command.
#[derive(Debug, Args)]
pub struct PartitionsArgs {
    /// Database holding the table.
    #[arg(long)]
    pub database: String,

    /// Table to list.
    #[arg(long)]
    pub table: String,

    /// Only list partitions where column=value (repeatable).
    #[arg(long = "match", value_parser = KeyValue::from_str)]
    pub matches: Vec<KeyValue>,

    /// Only list partitions whose column sorts before value.
    #[arg(long, value_parser = KeyValue::from_str)]
    pub before: Option<KeyValue>,
}

/// Execute the partitions command.
///
/// # Errors
///
/// Returns an error if the gateway cannot be built, the selector names an
/// unknown column, or output cannot be rendered.
pub async fn execute(args: PartitionsArgs, config: &Config) -> Result<()> {
    let gateway = config.gateway()?;
    let names = gateway
        .fetch_partition_names(&args.database, &args.table)
        .await;
    let selector = selector(&args.matches, args.before.as_ref());
    let selected = select(&names, &selector)?;
    println!("{}", render(&selected, &config.format)?);
    Ok(())
}

/// Parses listed names and keeps those the selector picks, in name order.
///
/// # Errors
///
/// Returns an error if a name does not parse or the selector filters on a
/// column the table is not partitioned by.
pub fn select(names: &[String], selector: &PartitionSelector) -> Result<Vec<PartitionKey>> {
    let keys = names
        .iter()
        .map(|name| {
            PartitionKey::parse_name(name).map_err(|e| Error::invalid_partition(name, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(first) = keys.first() {
        selector.validate_columns(&first.columns())?;
    }
    let mut selected: Vec<_> = keys.into_iter().filter(|k| selector.selects(k)).collect();
    selected.sort_by_cached_key(ToString::to_string);
    Ok(selected)
}

fn render(keys: &[PartitionKey], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
            Ok(serde_json::to_string_pretty(&names)?)
        }
        OutputFormat::Text => {
            if keys.is_empty() {
                return Ok("No partitions selected".to_string());
            }
            Ok(keys.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))
        }
        OutputFormat::Table => {
            use tabled::builder::Builder;

            let Some(first) = keys.first() else {
                return Ok("No partitions selected".to_string());
            };
            let mut builder = Builder::default();
            builder.push_record(first.columns());
            for key in keys {
                builder.push_record(key.iter().map(|(_, value)| value.to_string()));
            }
            Ok(builder.build().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_select_sorts_and_filters() {
        let listed = names(&["d=2024-03-01", "d=2024-01-01", "d=2024-02-01"]);
        let selector = PartitionSelector::all().with_before("d", "2024-03-01");
        let selected = select(&listed, &selector).unwrap();
        let selected: Vec<String> = selected.iter().map(ToString::to_string).collect();
        assert_eq!(selected, vec!["d=2024-01-01", "d=2024-02-01"]);
    }

    #[test]
    fn test_select_rejects_unknown_columns() {
        let listed = names(&["d=2024-01-01"]);
        let selector = PartitionSelector::all().with_match("region", "us");
        assert!(select(&listed, &selector).is_err());
    }

    #[test]
    fn test_render_formats() {
        let keys = select(
            &names(&["d=2024-01-01/region=us", "d=2024-01-02/region=eu"]),
            &PartitionSelector::all(),
        )
        .unwrap();

        assert_eq!(
            render(&keys, &OutputFormat::Text).unwrap(),
            "d=2024-01-01/region=us\nd=2024-01-02/region=eu"
        );
        let table = render(&keys, &OutputFormat::Table).unwrap();
        assert!(table.contains("region"));
        assert!(table.contains("2024-01-02"));
        assert_eq!(
            render(&[], &OutputFormat::Text).unwrap(),
            "No partitions selected"
        );
    }
}
