//! Partition archival engine.
//!
//! For every table the engine derives and creates the part2 table, then moves
//! the selected partitions one at a time:
//!
//! 1. Count the partition's rows in part1.
//! 2. Copy them into part2 under this run's insertion-time partition and check
//!    part2 reports the same count.
//! 3. Drop the partition from part1 and check part1 reports zero rows.
//! 4. If step 3 cannot be confirmed, undo step 2.
//!
//! Every step is awaited before the next and nothing is retried. A failure
//! stops the partition where it is; it never stops the run.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use coldstore_core::{PartitionKey, PartitionSelector, archive_span, partition_span};

use crate::config::ArchivalConfig;
use crate::error::{ArchiveError, Result};
use crate::gateway::WarehouseGateway;
use crate::metrics;
use crate::oplog::OperationLog;
use crate::outcome::{ArchivalState, PartitionOutcome, PartitionState, TableArchival};
use crate::query;
use crate::schema::derive_target_schema;

/// Format of the `part2_insertion_time_partition` value.
pub const INSERTION_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// A table ready for partition moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTable {
    /// Fully qualified part1 table.
    pub source_table: String,
    /// Fully qualified part2 table.
    pub part2_table: String,
    /// Data columns copied by each insert.
    pub columns: Vec<String>,
    /// Selected partitions, in name order.
    pub partitions: Vec<PartitionKey>,
}

/// Moves partitions from part1 tables into part2 tables.
#[derive(Debug)]
pub struct ArchivalEngine<G> {
    gateway: G,
    config: ArchivalConfig,
    operation_log: Option<OperationLog>,
    batch_id: Uuid,
}

impl<G: WarehouseGateway> ArchivalEngine<G> {
    /// Creates an engine with a fresh batch id.
    ///
    /// The operation log is enabled when `config.operation_log_table` is set.
    #[must_use]
    pub fn new(gateway: G, config: ArchivalConfig) -> Self {
        let operation_log = config.operation_log_table.clone().map(OperationLog::new);
        Self {
            gateway,
            config,
            operation_log,
            batch_id: Uuid::now_v7(),
        }
    }

    /// Replaces the batch id.
    #[must_use]
    pub fn with_batch_id(mut self, batch_id: Uuid) -> Self {
        self.batch_id = batch_id;
        self
    }

    /// Identifier written to the operation log for this run.
    #[must_use]
    pub const fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// The gateway.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The archival configuration.
    #[must_use]
    pub fn config(&self) -> &ArchivalConfig {
        &self.config
    }

    /// Archives the selected partitions of `database.table` for each table.
    ///
    /// `now` becomes this run's insertion-time partition value. A table listed
    /// more than once is archived once. The returned state holds one record
    /// per table, including tables that failed to prepare.
    pub async fn run(
        &self,
        database: &str,
        tables: &[String],
        selector: &PartitionSelector,
        now: DateTime<Utc>,
    ) -> ArchivalState {
        let insertion_time = now.format(INSERTION_TIME_FORMAT).to_string();
        let mut state = ArchivalState::new(self.batch_id, insertion_time.clone());

        tracing::info!(
            batch_id = %self.batch_id,
            database,
            tables = tables.len(),
            insertion_time = %insertion_time,
            dry_run = self.config.dry_run,
            "starting archival run"
        );

        if !self.config.dry_run {
            if let Some(log) = &self.operation_log {
                if let Err(err) = self.gateway.execute_statement(&log.create_statement()).await {
                    tracing::warn!(log_table = log.table(), error = %err, "failed to create operation log table");
                }
            }
        }

        let mut seen = BTreeSet::new();
        for table in tables {
            if !seen.insert(table.as_str()) {
                tracing::warn!(table = %table, "table listed more than once; archiving it once");
                continue;
            }
            let source = format!("{database}.{table}");
            let record = state.table_mut(&source);
            self.archive_table(database, table, selector, &insertion_time, record)
                .instrument(archive_span("archive_table", &source))
                .await;
        }

        tracing::info!(
            batch_id = %self.batch_id,
            partitions = state.outcomes().count(),
            needs_manual_intervention = state.needs_manual_intervention(),
            "archival run finished"
        );
        state
    }

    async fn archive_table(
        &self,
        database: &str,
        table: &str,
        selector: &PartitionSelector,
        insertion_time: &str,
        record: &mut TableArchival,
    ) {
        let prepared = match self.prepare_table(database, table, selector, record).await {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::error!(error = %err, "table could not be prepared; skipping");
                metrics::record_table_failure(&format!("{database}.{table}"), err.as_label());
                record.error = Some(err);
                return;
            }
        };

        for key in &prepared.partitions {
            let name = key.to_string();
            let outcome = self
                .archive_partition(&prepared, key, insertion_time)
                .instrument(partition_span(&prepared.source_table, &name))
                .await;
            metrics::record_partition(
                &prepared.source_table,
                outcome.state(),
                outcome.source_rows(),
            );
            if !self.config.dry_run {
                if let Some(log) = &self.operation_log {
                    let logged_at = Utc::now().to_rfc3339();
                    log.append(
                        &self.gateway,
                        self.batch_id,
                        &prepared.source_table,
                        &outcome,
                        &logged_at,
                    )
                    .await;
                }
            }
            record.record(outcome);
        }
    }

    /// Derives and creates the part2 table and selects the partitions to move.
    ///
    /// In dry-run mode the part2 table is derived but not created.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::SchemaFetch`] if the creation statement cannot
    /// be retrieved, [`ArchiveError::SchemaMalformed`] if it cannot be
    /// transformed or no data columns are found,
    /// [`ArchiveError::GatewayExecution`] if the part2 table cannot be created,
    /// and [`ArchiveError::Core`] if the selector names a column the table is
    /// not partitioned by.
    pub async fn prepare_table(
        &self,
        database: &str,
        table: &str,
        selector: &PartitionSelector,
        record: &mut TableArchival,
    ) -> Result<PreparedTable> {
        let source_table = format!("{database}.{table}");
        let part2_table = self.config.part2_table(database, table);
        record.part2_table = Some(part2_table.clone());

        let dump = self
            .gateway
            .fetch_rows(&query::show_create_query(&source_table))
            .await
            .map_err(|source| ArchiveError::SchemaFetch {
                table: source_table.clone(),
                source,
            })?;
        let schema = derive_target_schema(&dump, &part2_table)?;

        if self.config.dry_run {
            tracing::info!(part2_table = %part2_table, statement = %schema.create_statement, "dry run: not creating part2 table");
        } else {
            self.gateway
                .execute_statement(&schema.create_statement)
                .await
                .map_err(ArchiveError::GatewayExecution)?;
            tracing::info!(part2_table = %part2_table, "part2 table ready");

            let (part2_database, part2_name) = split_table(&part2_table);
            match self
                .gateway
                .fetch_table_location(part2_name, part2_database)
                .await
            {
                Ok(location) => {
                    tracing::info!(part2_table = %part2_table, location = %location, "part2 table location");
                    record.part2_location = Some(location);
                }
                Err(err) => {
                    tracing::warn!(part2_table = %part2_table, error = %err, "part2 table location unavailable");
                }
            }
        }

        let mut keys = Vec::new();
        for name in self.gateway.fetch_partition_names(database, table).await {
            match PartitionKey::parse_name(&name) {
                Ok(key) => keys.push(key),
                Err(err) => {
                    let err = coldstore_core::Error::invalid_partition(&name, err);
                    tracing::warn!(error = %err, "skipping unparseable partition name");
                }
            }
        }
        let partition_columns = keys.first().map(PartitionKey::columns).unwrap_or_default();
        if !partition_columns.is_empty() {
            selector.validate_columns(&partition_columns)?;
        }

        let mut columns = schema.columns;
        if columns.is_empty() {
            columns = self
                .gateway
                .fetch_columns_excluding_partitions(&source_table, &partition_columns)
                .await;
        }
        if columns.is_empty() {
            return Err(ArchiveError::schema_malformed(format!(
                "no data columns found for {source_table}"
            )));
        }
        record.columns.clone_from(&columns);

        let listed = keys.len();
        let mut partitions: Vec<PartitionKey> =
            keys.into_iter().filter(|key| selector.selects(key)).collect();
        partitions.sort_by_cached_key(ToString::to_string);
        let selected = partitions.len();
        if let Some(limit) = self.config.max_partitions_per_table {
            partitions.truncate(limit);
        }
        tracing::info!(
            listed,
            selected,
            processing = partitions.len(),
            "partitions selected"
        );

        Ok(PreparedTable {
            source_table,
            part2_table,
            columns,
            partitions,
        })
    }

    /// Moves one partition and returns its sealed outcome.
    ///
    /// A part1 drop that times out is never rolled back: the statement may
    /// still complete on the server, so the part2 copy is kept and the
    /// partition ends in [`PartitionState::RollbackFailed`].
    pub async fn archive_partition(
        &self,
        table: &PreparedTable,
        key: &PartitionKey,
        insertion_time: &str,
    ) -> PartitionOutcome {
        let mut outcome = PartitionOutcome::new(key.clone());
        let condition = query::partition_condition(key);

        let source_rows = match self.count(&table.source_table, &condition).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "source count unavailable; partition left in place");
                outcome.record_error(err);
                outcome.finish();
                return outcome;
            }
        };
        outcome.record_source_rows(source_rows);

        if self.config.dry_run {
            tracing::info!(source_rows, "dry run: partition would be moved");
            outcome.finish();
            return outcome;
        }

        if let Err(err) = self
            .insert_phase(table, key, &condition, insertion_time, source_rows)
            .await
        {
            tracing::warn!(error = %err, "copy into part2 failed; partition left in place");
            outcome.record_error(err);
            outcome.finish();
            return outcome;
        }
        advance(&mut outcome, PartitionState::Inserted);

        match self.delete_phase(table, key, &condition).await {
            Ok(()) => {
                advance(&mut outcome, PartitionState::Moved);
                tracing::info!(source_rows, "partition moved");
            }
            Err(err) if err.is_timeout() => {
                // The drop may still finish server-side after beeline is killed.
                tracing::error!(
                    error = %err,
                    "part1 drop timed out; keeping part2 copy, manual intervention required"
                );
                advance(&mut outcome, PartitionState::RollbackRequired);
                outcome.record_error(ArchiveError::rollback_failed(format!(
                    "part1 drop timed out and may still complete; part2 copy kept: {err}"
                )));
                advance(&mut outcome, PartitionState::RollbackFailed);
            }
            Err(err) => {
                tracing::warn!(error = %err, "part1 drop not confirmed; rolling back part2 copy");
                outcome.record_error(err);
                advance(&mut outcome, PartitionState::RollbackRequired);
                match self
                    .rollback(table, key, &condition, insertion_time, source_rows)
                    .await
                {
                    Ok(()) => {
                        advance(&mut outcome, PartitionState::RolledBack);
                        tracing::info!("part2 copy rolled back");
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "rollback failed; manual intervention required");
                        outcome.record_error(err);
                        advance(&mut outcome, PartitionState::RollbackFailed);
                    }
                }
            }
        }

        outcome.finish();
        outcome
    }

    async fn insert_phase(
        &self,
        table: &PreparedTable,
        key: &PartitionKey,
        condition: &str,
        insertion_time: &str,
        source_rows: u64,
    ) -> Result<()> {
        let statement = query::insert_partition_statement(
            &table.part2_table,
            &table.source_table,
            key,
            &table.columns,
            insertion_time,
        );
        self.gateway
            .execute_statement(&statement)
            .await
            .map_err(ArchiveError::GatewayExecution)?;

        let inserted_condition = query::part2_condition(key, insertion_time);
        let inserted = self.count(&table.part2_table, &inserted_condition).await?;
        if inserted != source_rows {
            return Err(ArchiveError::RowCountMismatch {
                table: table.part2_table.clone(),
                expected: source_rows,
                actual: inserted,
            });
        }
        tracing::debug!(
            condition,
            rows = inserted,
            "part2 copy verified"
        );
        Ok(())
    }

    async fn delete_phase(
        &self,
        table: &PreparedTable,
        key: &PartitionKey,
        condition: &str,
    ) -> Result<()> {
        let statement = query::drop_partition_statement(
            &table.source_table,
            &query::partition_spec(key, None),
            self.config.purge,
        );
        self.gateway
            .execute_statement(&statement)
            .await
            .map_err(ArchiveError::GatewayExecution)?;

        let remaining = self.count(&table.source_table, condition).await?;
        if remaining != 0 {
            return Err(ArchiveError::RowCountMismatch {
                table: table.source_table.clone(),
                expected: 0,
                actual: remaining,
            });
        }
        Ok(())
    }

    /// Removes this run's part2 copy of a partition.
    ///
    /// With `verify_part1_before_rollback`, the copy is only removed while
    /// part1 still holds every source row.
    async fn rollback(
        &self,
        table: &PreparedTable,
        key: &PartitionKey,
        condition: &str,
        insertion_time: &str,
        source_rows: u64,
    ) -> Result<()> {
        if self.config.verify_part1_before_rollback {
            let current = self
                .count(&table.source_table, condition)
                .await
                .map_err(|err| {
                    ArchiveError::rollback_failed(format!(
                        "could not confirm part1 still holds the partition: {err}"
                    ))
                })?;
            if current != source_rows {
                return Err(ArchiveError::rollback_failed(format!(
                    "part1 holds {current} of {source_rows} rows; keeping the part2 copy"
                )));
            }
        }

        let statement = query::drop_partition_statement(
            &table.part2_table,
            &query::partition_spec(key, Some(insertion_time)),
            self.config.purge,
        );
        self.gateway
            .execute_statement(&statement)
            .await
            .map_err(|err| ArchiveError::rollback_failed(format!("part2 drop failed: {err}")))?;

        let remaining = self
            .count(&table.part2_table, &query::part2_condition(key, insertion_time))
            .await
            .map_err(|err| {
                ArchiveError::rollback_failed(format!("could not confirm part2 drop: {err}"))
            })?;
        if remaining != 0 {
            return Err(ArchiveError::rollback_failed(format!(
                "part2 still holds {remaining} rows after drop"
            )));
        }
        Ok(())
    }

    async fn count(&self, table: &str, condition: &str) -> Result<u64> {
        self.gateway
            .fetch_row_count(table, Some(condition))
            .await
            .map_err(|source| ArchiveError::RowCountUnavailable {
                table: table.to_string(),
                condition: condition.to_string(),
                source,
            })
    }
}

fn advance(outcome: &mut PartitionOutcome, target: PartitionState) {
    if let Err(err) = outcome.advance(target) {
        tracing::error!(error = %err, "rejected partition state change");
        outcome.record_error(err);
    }
}

fn split_table(qualified: &str) -> (&str, &str) {
    qualified.split_once('.').unwrap_or(("default", qualified))
}
