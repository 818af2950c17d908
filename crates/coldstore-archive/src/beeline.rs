//! [`WarehouseGateway`] backed by the `beeline` command-line client.
//!
//! Each call spawns one `beeline` process and waits for it. Arguments are
//! passed directly (no shell), so statement text is never re-interpreted.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::WarehouseGateway;
use crate::metrics;

/// Output format for statements (engine output is discarded).
const STATEMENT_FORMAT: &str = "csv2";
/// Output format for queries (`|`-delimited rows).
const QUERY_FORMAT: &str = "dsv";
/// Characters of stderr kept in error messages.
const STDERR_TAIL_CHARS: usize = 2000;

/// Gateway that shells out to `beeline`.
#[derive(Debug, Clone)]
pub struct BeelineGateway {
    config: GatewayConfig,
}

impl BeelineGateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Builds the beeline argument list for `query`.
    ///
    /// Session settings are only sent with statements; queries run with the
    /// server defaults.
    #[must_use]
    pub fn args(&self, query: &str, kind: CallKind) -> Vec<String> {
        let format = match kind {
            CallKind::Statement => STATEMENT_FORMAT,
            CallKind::Query => QUERY_FORMAT,
        };
        let mut args = vec![
            "-u".to_string(),
            self.config.connection.jdbc_url().to_string(),
            format!("--outputformat={format}"),
            "--silent=true".to_string(),
            "--verbose=false".to_string(),
            "--showheader=false".to_string(),
        ];
        if kind == CallKind::Statement {
            for setting in &self.config.session_settings {
                args.push("-e".to_string());
                args.push(setting.clone());
            }
        }
        args.push("-e".to_string());
        args.push(query.to_string());
        args
    }

    async fn run(&self, query: &str, kind: CallKind) -> Result<String, GatewayError> {
        let mut command = Command::new(&self.config.beeline_bin);
        command
            .args(self.args(query, kind))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(kind = kind.as_label(), query, "running beeline");
        let started = Instant::now();
        let output = command.output();
        let output = match self.config.statement_timeout {
            Some(after) => match tokio::time::timeout(after, output).await {
                Ok(output) => output,
                Err(_) => {
                    metrics::record_gateway_call(kind.as_label(), "timeout", started.elapsed());
                    return Err(GatewayError::Timeout {
                        statement: query.to_string(),
                        after,
                    });
                }
            },
            None => output.await,
        };
        let output = output.map_err(|e| {
            metrics::record_gateway_call(kind.as_label(), "spawn_error", started.elapsed());
            GatewayError::Spawn {
                message: format!("{}: {e}", self.config.beeline_bin),
            }
        })?;

        if !output.status.success() {
            metrics::record_gateway_call(kind.as_label(), "failed", started.elapsed());
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::execution(
                query,
                format!("{}: {}", output.status, tail(stderr.trim())),
            ));
        }

        metrics::record_gateway_call(kind.as_label(), "ok", started.elapsed());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Whether a call changes the warehouse or reads from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// DDL/DML; output discarded.
    Statement,
    /// Query; output returned.
    Query,
}

impl CallKind {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Query => "query",
        }
    }
}

fn tail(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL_CHARS - 1)
        .map_or(0, |(i, _)| i);
    &text[start..]
}

#[async_trait]
impl WarehouseGateway for BeelineGateway {
    async fn execute_statement(&self, statement: &str) -> Result<(), GatewayError> {
        self.run(statement, CallKind::Statement).await.map(|_| ())
    }

    async fn fetch_rows(&self, query: &str) -> Result<String, GatewayError> {
        self.run(query, CallKind::Query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarehouseConnection;

    fn gateway(bin: &str) -> BeelineGateway {
        let connection = WarehouseConnection::new("jdbc:hive2://hs2:10000/default").unwrap();
        let mut config = GatewayConfig::new(connection);
        config.beeline_bin = bin.to_string();
        BeelineGateway::new(config)
    }

    #[test]
    fn statements_carry_session_settings_before_the_statement() {
        let args = gateway("beeline").args("DROP TABLE x", CallKind::Statement);
        assert_eq!(args[0], "-u");
        assert_eq!(args[1], "jdbc:hive2://hs2:10000/default");
        assert!(args.contains(&"--outputformat=csv2".to_string()));
        assert_eq!(
            &args[args.len() - 6..],
            &[
                "-e",
                "set hive.exec.dynamic.partition.mode=nonstrict;",
                "-e",
                "set hive.tez.java.opts=-XX:+UseG1GC;",
                "-e",
                "DROP TABLE x",
            ]
        );
    }

    #[test]
    fn queries_use_dsv_without_settings() {
        let args = gateway("beeline").args("SELECT 1", CallKind::Query);
        assert!(args.contains(&"--outputformat=dsv".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-e").count(), 1);
        assert_eq!(args.last().map(String::as_str), Some("SELECT 1"));
    }

    #[test]
    fn tail_keeps_the_end_of_long_output() {
        let long = "x".repeat(STDERR_TAIL_CHARS + 10) + "END";
        let kept = tail(&long);
        assert_eq!(kept.chars().count(), STDERR_TAIL_CHARS);
        assert!(kept.ends_with("END"));
        assert_eq!(tail("short"), "short");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let gateway = gateway("/nonexistent/coldstore-beeline");
        let err = gateway.execute_statement("SELECT 1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_execution_error() {
        let gateway = gateway("false");
        let err = gateway.fetch_rows("SELECT 1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Execution { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fetch_rows_returns_stdout() {
        // `echo` prints its arguments, the query being the last one.
        let gateway = gateway("echo");
        let out = gateway.fetch_rows("42").await.unwrap();
        assert!(out.trim_end().ends_with("42"));
    }
}
