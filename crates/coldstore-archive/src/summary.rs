//! Run summaries: per-table and overall counts of the four outcome flags.

use std::fmt;
use std::ops::AddAssign;

use serde::Serialize;

use crate::outcome::{ArchivalState, PartitionOutcome, TableArchival};

/// Number of partitions with each outcome flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Partitions copied into part2.
    pub inserted_to_part2: usize,
    /// Partitions removed from part1.
    pub deleted_from_part1: usize,
    /// Partitions whose part2 copy needed undoing.
    pub rollback_required: usize,
    /// Partitions whose part2 copy was undone.
    pub rollback_succeeded: usize,
}

impl OutcomeCounts {
    /// Counts the flags of a set of outcomes.
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a PartitionOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.inserted_to_part2 += usize::from(outcome.inserted_to_part2());
            counts.deleted_from_part1 += usize::from(outcome.deleted_from_part1());
            counts.rollback_required += usize::from(outcome.rollback_required());
            counts.rollback_succeeded += usize::from(outcome.rollback_succeeded());
        }
        counts
    }
}

impl AddAssign for OutcomeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted_to_part2 += rhs.inserted_to_part2;
        self.deleted_from_part1 += rhs.deleted_from_part1;
        self.rollback_required += rhs.rollback_required;
        self.rollback_succeeded += rhs.rollback_succeeded;
    }
}

/// Summary of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    /// Source table name.
    pub table: String,
    /// Part2 table name, if derived.
    pub part2_table: Option<String>,
    /// Partitions processed.
    pub partitions: usize,
    /// Flag counts.
    pub counts: OutcomeCounts,
    /// Why the table could not be prepared.
    pub error: Option<String>,
}

impl TableSummary {
    fn new(table: &str, archival: &TableArchival) -> Self {
        Self {
            table: table.to_string(),
            part2_table: archival.part2_table.clone(),
            partitions: archival.partitions.len(),
            counts: OutcomeCounts::from_outcomes(archival.partitions.values()),
            error: archival.error.as_ref().map(ToString::to_string),
        }
    }

    /// The report line for this table.
    #[must_use]
    pub fn line(&self) -> String {
        let c = &self.counts;
        let mut line = format!(
            "Table: {}: Partitions: Inserted to Part2: {}, Deleted from Part1: {}, Rollback Required: {}, Rollback Success: {}",
            self.table,
            c.inserted_to_part2,
            c.deleted_from_part1,
            c.rollback_required,
            c.rollback_succeeded
        );
        if let Some(error) = &self.error {
            line.push_str(", Error: ");
            line.push_str(error);
        }
        line
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalSummary {
    /// Run identifier.
    pub batch_id: String,
    /// Tables in name order.
    pub tables: Vec<TableSummary>,
    /// Counts across all tables.
    pub totals: OutcomeCounts,
    /// Partitions ending in `ROLLBACK_FAILED`.
    pub rollback_failures: usize,
}

impl ArchivalSummary {
    /// The overall report line.
    #[must_use]
    pub fn overall_line(&self) -> String {
        let t = &self.totals;
        format!(
            "Total Tables: {}, Total Partitions Inserted to Part2: {}, Total Partitions Deleted from Part1: {}, Total Rollback Required: {}, Total Rollback Success: {}",
            self.tables.len(),
            t.inserted_to_part2,
            t.deleted_from_part1,
            t.rollback_required,
            t.rollback_succeeded
        )
    }

    /// Per-table lines and the overall line.
    #[must_use]
    pub fn lines(&self) -> (Vec<String>, String) {
        (
            self.tables.iter().map(TableSummary::line).collect(),
            self.overall_line(),
        )
    }
}

impl fmt::Display for ArchivalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(f, "{}", table.line())?;
        }
        write!(f, "{}", self.overall_line())
    }
}

/// Summarizes a finished run.
#[must_use]
pub fn summarize(state: &ArchivalState) -> ArchivalSummary {
    let tables: Vec<TableSummary> = state
        .tables
        .iter()
        .map(|(name, archival)| TableSummary::new(name, archival))
        .collect();
    let mut totals = OutcomeCounts::default();
    for table in &tables {
        totals += table.counts;
    }
    let rollback_failures = state
        .outcomes()
        .filter(|(_, o)| o.state() == crate::outcome::PartitionState::RollbackFailed)
        .count();
    ArchivalSummary {
        batch_id: state.batch_id.to_string(),
        tables,
        totals,
        rollback_failures,
    }
}
