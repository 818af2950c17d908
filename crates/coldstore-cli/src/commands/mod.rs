//! CLI command implementations.

pub mod archive;
pub mod derive_schema;
pub mod export_log;
pub mod partitions;

use std::str::FromStr;

use anyhow::Result;
use owo_colors::OwoColorize;

use coldstore_core::PartitionSelector;

/// Parsed `column=value` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Partition column.
    pub key: String,
    /// Partition value.
    pub value: String,
}

impl FromStr for KeyValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected column=value, got '{s}'"))?;
        if key.is_empty() || value.is_empty() {
            anyhow::bail!("expected column=value, got '{s}'");
        }
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Builds a selector from `--match` and `--before` arguments.
#[must_use]
pub fn selector(matches: &[KeyValue], before: Option<&KeyValue>) -> PartitionSelector {
    let mut selector = matches
        .iter()
        .fold(PartitionSelector::all(), |s, kv| s.with_match(&kv.key, &kv.value));
    if let Some(kv) = before {
        selector = selector.with_before(&kv.key, &kv.value);
    }
    selector
}

fn format_state_colored(state: &str) -> String {
    match state {
        "MOVED" => state.green().to_string(),
        "ROLLBACK_FAILED" => state.red().to_string(),
        "ROLLED_BACK" | "ROLLBACK_REQUIRED" => state.yellow().to_string(),
        "PENDING" | "INSERTED" => state.dimmed().to_string(),
        _ => state.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstore_core::PartitionKey;

    #[test]
    fn key_value_requires_both_sides() {
        let kv: KeyValue = "d=2024-01-01".parse().unwrap();
        assert_eq!(kv.key, "d");
        assert_eq!(kv.value, "2024-01-01");
        assert!("d".parse::<KeyValue>().is_err());
        assert!("=x".parse::<KeyValue>().is_err());
        assert!("d=".parse::<KeyValue>().is_err());
    }

    #[test]
    fn value_may_contain_equals() {
        let kv: KeyValue = "tag=a=b".parse().unwrap();
        assert_eq!(kv.value, "a=b");
    }

    #[test]
    fn selector_combines_match_and_before() {
        let matches = vec!["region=us".parse().unwrap()];
        let before: KeyValue = "d=2024-02-01".parse().unwrap();
        let selector = selector(&matches, Some(&before));

        let old_us = PartitionKey::parse_name("d=2024-01-01/region=us").unwrap();
        let old_eu = PartitionKey::parse_name("d=2024-01-01/region=eu").unwrap();
        let new_us = PartitionKey::parse_name("d=2024-03-01/region=us").unwrap();
        assert!(selector.selects(&old_us));
        assert!(!selector.selects(&old_eu));
        assert!(!selector.selects(&new_us));
    }
}
