//! Gateway and archival configuration.
//!
//! Both structs have defaults and can be loaded from `COLDSTORE_*` environment
//! variables; the CLI layers its flags on top.

use std::time::Duration;

use coldstore_core::{Error, Result};

/// Warehouse connection descriptor (a JDBC URL for beeline).
///
/// The URL may carry credentials, so `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConnection {
    jdbc_url: String,
}

impl WarehouseConnection {
    /// Creates a connection descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the URL is blank or not a `jdbc:` URL.
    pub fn new(jdbc_url: impl Into<String>) -> Result<Self> {
        let jdbc_url = jdbc_url.into().trim().to_string();
        if !jdbc_url.starts_with("jdbc:") {
            return Err(Error::invalid_input(
                "warehouse connection must be a jdbc: URL (COLDSTORE_JDBC_URL)",
            ));
        }
        Ok(Self { jdbc_url })
    }

    /// Returns the JDBC URL.
    #[must_use]
    pub fn jdbc_url(&self) -> &str {
        &self.jdbc_url
    }
}

impl std::fmt::Debug for WarehouseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme_and_host = self
            .jdbc_url
            .split(';')
            .next()
            .unwrap_or_default();
        f.debug_struct("WarehouseConnection")
            .field("jdbc_url", &format!("{scheme_and_host};[REDACTED]"))
            .finish()
    }
}

/// Default session settings sent before every statement.
pub const DEFAULT_SESSION_SETTINGS: [&str; 2] = [
    "set hive.exec.dynamic.partition.mode=nonstrict;",
    "set hive.tez.java.opts=-XX:+UseG1GC;",
];

/// Configuration for the beeline gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Warehouse connection.
    pub connection: WarehouseConnection,
    /// Path or name of the beeline executable.
    pub beeline_bin: String,
    /// Settings sent (each as its own `-e`) before statements.
    pub session_settings: Vec<String>,
    /// Kill a statement that runs longer than this. `None` waits forever.
    pub statement_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Creates a gateway configuration with defaults for everything but the
    /// connection.
    #[must_use]
    pub fn new(connection: WarehouseConnection) -> Self {
        Self {
            connection,
            beeline_bin: "beeline".to_string(),
            session_settings: DEFAULT_SESSION_SETTINGS
                .iter()
                .map(ToString::to_string)
                .collect(),
            statement_timeout: None,
        }
    }

    /// Loads gateway configuration from the environment.
    ///
    /// - `COLDSTORE_JDBC_URL` (required)
    /// - `COLDSTORE_BEELINE_BIN`
    /// - `COLDSTORE_STATEMENT_TIMEOUT_SECS` (`0` disables the timeout)
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing or a value does not parse.
    pub fn from_env() -> Result<Self> {
        let url = env_string("COLDSTORE_JDBC_URL")
            .ok_or_else(|| Error::invalid_input("COLDSTORE_JDBC_URL is required"))?;
        let mut config = Self::new(WarehouseConnection::new(url)?);
        if let Some(bin) = env_string("COLDSTORE_BEELINE_BIN") {
            config.beeline_bin = bin;
        }
        if let Some(secs) = env_u64("COLDSTORE_STATEMENT_TIMEOUT_SECS")? {
            config.statement_timeout = timeout_from_secs(secs);
        }
        Ok(config)
    }
}

/// Converts a seconds setting into a timeout; `0` means none.
#[must_use]
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Configuration for an archival run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalConfig {
    /// Database of the part2 tables; defaults to each source table's database.
    pub part2_database: Option<String>,
    /// Suffix appended to the source table name to form the part2 table name.
    pub part2_suffix: String,
    /// Drop part1 partitions with `PURGE` (skip the trash).
    pub purge: bool,
    /// Derive, list and count but issue no CREATE, INSERT or DROP.
    pub dry_run: bool,
    /// Process at most this many selected partitions per table.
    pub max_partitions_per_table: Option<usize>,
    /// Before rolling back, check part1 still holds the partition's rows and
    /// refuse to delete the part2 copy if it does not.
    pub verify_part1_before_rollback: bool,
    /// Table receiving one row per partition outcome.
    pub operation_log_table: Option<String>,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            part2_database: None,
            part2_suffix: "_part2".to_string(),
            purge: false,
            dry_run: false,
            max_partitions_per_table: None,
            verify_part1_before_rollback: true,
            operation_log_table: None,
        }
    }
}

impl ArchivalConfig {
    /// Loads archival configuration from the environment.
    ///
    /// - `COLDSTORE_PART2_DATABASE`
    /// - `COLDSTORE_PART2_SUFFIX`
    /// - `COLDSTORE_PURGE`
    /// - `COLDSTORE_DRY_RUN`
    /// - `COLDSTORE_MAX_PARTITIONS_PER_TABLE`
    /// - `COLDSTORE_VERIFY_PART1_BEFORE_ROLLBACK`
    /// - `COLDSTORE_OPERATION_LOG_TABLE`
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not parse or the result is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            part2_database: env_string("COLDSTORE_PART2_DATABASE"),
            operation_log_table: env_string("COLDSTORE_OPERATION_LOG_TABLE"),
            ..Self::default()
        };
        if let Some(suffix) = env_string("COLDSTORE_PART2_SUFFIX") {
            config.part2_suffix = suffix;
        }
        if let Some(purge) = env_bool("COLDSTORE_PURGE")? {
            config.purge = purge;
        }
        if let Some(dry_run) = env_bool("COLDSTORE_DRY_RUN")? {
            config.dry_run = dry_run;
        }
        config.max_partitions_per_table = env_usize("COLDSTORE_MAX_PARTITIONS_PER_TABLE")?;
        if let Some(verify) = env_bool("COLDSTORE_VERIFY_PART1_BEFORE_ROLLBACK")? {
            config.verify_part1_before_rollback = verify;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if part2 tables could collide with their
    /// sources or the partition limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.part2_suffix.is_empty() && self.part2_database.is_none() {
            return Err(Error::invalid_input(
                "part2 suffix may only be empty when a part2 database is set",
            ));
        }
        if self.part2_suffix.contains(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
            return Err(Error::invalid_input(format!(
                "part2 suffix must be alphanumeric or '_': {:?}",
                self.part2_suffix
            )));
        }
        if self.max_partitions_per_table == Some(0) {
            return Err(Error::invalid_input(
                "max partitions per table must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns the fully qualified part2 table for `database.table`.
    #[must_use]
    pub fn part2_table(&self, database: &str, table: &str) -> String {
        let database = self.part2_database.as_deref().unwrap_or(database);
        format!("{database}.{table}{}", self.part2_suffix)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::invalid_input(format!("{name} must be a u64: {e}")))
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<usize>()
        .map(Some)
        .map_err(|e| Error::invalid_input(format!("{name} must be a usize: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}
