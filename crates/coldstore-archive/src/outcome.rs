//! Per-partition archival state and the run-wide state map.
//!
//! This module provides:
//! - `PartitionState`: The state machine for one partition's move
//! - `PartitionOutcome`: A partition's state plus what stopped it, if anything
//! - `TableArchival`: Outcomes of one table, keyed by partition name
//! - `ArchivalState`: All tables of one run

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use uuid::Uuid;

use coldstore_core::PartitionKey;

use crate::error::ArchiveError;

/// Partition move state machine.
///
/// ```text
/// ┌─────────┐ copied + verified ┌──────────┐ dropped + verified ┌───────┐
/// │ PENDING │──────────────────►│ INSERTED │───────────────────►│ MOVED │
/// └─────────┘                   └──────────┘                    └───────┘
///                                    │
///                         drop failed / part1 still has rows
///                                    │
///                                    ▼
///                           ┌───────────────────┐
///                           │ ROLLBACK_REQUIRED │
///                           └───────────────────┘
///                                │          │
///                   part2 copy removed    rollback refused or failed
///                                │          │
///                                ▼          ▼
///                      ┌─────────────┐  ┌─────────────────┐
///                      │ ROLLED_BACK │  │ ROLLBACK_FAILED │
///                      └─────────────┘  └─────────────────┘
/// ```
///
/// A partition whose copy fails stays `PENDING`; nothing reached part2 that
/// the run will account for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionState {
    /// Not yet copied (or the copy failed).
    #[default]
    Pending,
    /// Copied into part2 with matching row count.
    Inserted,
    /// Copied into part2 and dropped from part1.
    Moved,
    /// The part1 drop could not be confirmed; the part2 copy must be undone.
    RollbackRequired,
    /// The part2 copy was removed; part1 is untouched.
    RolledBack,
    /// The part2 copy could not be safely removed; needs manual follow-up.
    RollbackFailed,
}

impl PartitionState {
    /// Returns true if no further step can follow.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Moved | Self::RolledBack | Self::RollbackFailed)
    }

    /// Returns true if the transition from self to target is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Inserted),
            Self::Inserted => matches!(target, Self::Moved | Self::RollbackRequired),
            Self::RollbackRequired => matches!(target, Self::RolledBack | Self::RollbackFailed),
            Self::Moved | Self::RolledBack | Self::RollbackFailed => false,
        }
    }

    /// Data for the partition was copied into part2 at some point.
    #[must_use]
    pub const fn inserted_to_part2(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The partition was removed from part1.
    #[must_use]
    pub const fn deleted_from_part1(&self) -> bool {
        matches!(self, Self::Moved)
    }

    /// The partition needed its part2 copy undone.
    #[must_use]
    pub const fn rollback_required(&self) -> bool {
        matches!(
            self,
            Self::RollbackRequired | Self::RolledBack | Self::RollbackFailed
        )
    }

    /// The part2 copy was undone.
    #[must_use]
    pub const fn rollback_succeeded(&self) -> bool {
        matches!(self, Self::RolledBack)
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Inserted => "inserted",
            Self::Moved => "moved",
            Self::RollbackRequired => "rollback_required",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
        }
    }
}

impl std::fmt::Display for PartitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Inserted => write!(f, "INSERTED"),
            Self::Moved => write!(f, "MOVED"),
            Self::RollbackRequired => write!(f, "ROLLBACK_REQUIRED"),
            Self::RolledBack => write!(f, "ROLLED_BACK"),
            Self::RollbackFailed => write!(f, "ROLLBACK_FAILED"),
        }
    }
}

/// Outcome of one partition's move.
///
/// Created `Pending` when the partition's move begins and mutated in place
/// until [`PartitionOutcome::finish`] seals it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionOutcome {
    partition: PartitionKey,
    state: PartitionState,
    source_rows: Option<u64>,
    #[serde(serialize_with = "serialize_error")]
    error: Option<ArchiveError>,
    #[serde(skip)]
    finished: bool,
}

impl PartitionOutcome {
    /// Starts tracking a partition.
    #[must_use]
    pub fn new(partition: PartitionKey) -> Self {
        Self {
            partition,
            state: PartitionState::Pending,
            source_rows: None,
            error: None,
            finished: false,
        }
    }

    /// Moves to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidTransition`] if the state machine does
    /// not allow it or the outcome is already finished.
    pub fn advance(&mut self, target: PartitionState) -> Result<(), ArchiveError> {
        if self.finished || !self.state.can_transition_to(target) {
            return Err(ArchiveError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Records the failure that stopped or redirected the move.
    pub fn record_error(&mut self, error: ArchiveError) {
        self.error = Some(error);
    }

    /// Records the part1 row count taken before the copy.
    pub fn record_source_rows(&mut self, rows: u64) {
        self.source_rows = Some(rows);
    }

    /// Seals the outcome; later transitions are rejected.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Returns true once the outcome is sealed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// The partition this outcome tracks.
    #[must_use]
    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PartitionState {
        self.state
    }

    /// Part1 row count taken before the copy, if it was obtained.
    #[must_use]
    pub const fn source_rows(&self) -> Option<u64> {
        self.source_rows
    }

    /// The failure that stopped or redirected the move, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    /// See [`PartitionState::inserted_to_part2`].
    #[must_use]
    pub const fn inserted_to_part2(&self) -> bool {
        self.state.inserted_to_part2()
    }

    /// See [`PartitionState::deleted_from_part1`].
    #[must_use]
    pub const fn deleted_from_part1(&self) -> bool {
        self.state.deleted_from_part1()
    }

    /// See [`PartitionState::rollback_required`].
    #[must_use]
    pub const fn rollback_required(&self) -> bool {
        self.state.rollback_required()
    }

    /// See [`PartitionState::rollback_succeeded`].
    #[must_use]
    pub const fn rollback_succeeded(&self) -> bool {
        self.state.rollback_succeeded()
    }
}

/// Archival record of one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableArchival {
    /// Part2 table name, once derived.
    pub part2_table: Option<String>,
    /// Part2 table storage location, when the warehouse reported it.
    pub part2_location: Option<String>,
    /// Data columns copied into part2.
    pub columns: Vec<String>,
    /// Outcomes keyed by partition name.
    pub partitions: BTreeMap<String, PartitionOutcome>,
    /// Why the table could not be prepared, if it could not.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ArchiveError>,
}

impl TableArchival {
    /// Stores an outcome under its partition name.
    pub fn record(&mut self, outcome: PartitionOutcome) {
        self.partitions
            .insert(outcome.partition().to_string(), outcome);
    }
}

/// State of one archival run: table name to [`TableArchival`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalState {
    /// Identifier of this run.
    pub batch_id: Uuid,
    /// Value of the part2 insertion-time partition written by this run.
    pub insertion_time: String,
    /// Tables by `database.table` name.
    pub tables: BTreeMap<String, TableArchival>,
}

impl ArchivalState {
    /// Creates an empty run state.
    #[must_use]
    pub fn new(batch_id: Uuid, insertion_time: impl Into<String>) -> Self {
        Self {
            batch_id,
            insertion_time: insertion_time.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Returns the table record, creating it if needed.
    pub fn table_mut(&mut self, table: &str) -> &mut TableArchival {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Iterates over every partition outcome of every table.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &PartitionOutcome)> {
        self.tables.iter().flat_map(|(table, archival)| {
            archival
                .partitions
                .values()
                .map(move |outcome| (table.as_str(), outcome))
        })
    }

    /// Returns true if any partition needs manual follow-up.
    #[must_use]
    pub fn needs_manual_intervention(&self) -> bool {
        self.outcomes()
            .any(|(_, o)| o.state() == PartitionState::RollbackFailed)
    }
}

fn serialize_error<S: Serializer>(error: &Option<ArchiveError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => s.serialize_some(&error.to_string()),
        None => s.serialize_none(),
    }
}
