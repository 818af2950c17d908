//! Custom assertion helpers for archival tests.

use coldstore_archive::outcome::{ArchivalState, PartitionOutcome, PartitionState};

use crate::gateway::ScriptedGateway;

/// The four outcome flags in report order: inserted to part2, deleted from
/// part1, rollback required, rollback succeeded.
pub type Flags = (bool, bool, bool, bool);

/// Returns an outcome's flags in report order.
pub fn flags(outcome: &PartitionOutcome) -> Flags {
    (
        outcome.inserted_to_part2(),
        outcome.deleted_from_part1(),
        outcome.rollback_required(),
        outcome.rollback_succeeded(),
    )
}

/// Returns the outcome of `partition` in `table`.
///
/// # Panics
///
/// Panics if there is no such outcome.
pub fn outcome<'a>(state: &'a ArchivalState, table: &str, partition: &str) -> &'a PartitionOutcome {
    state
        .tables
        .get(table)
        .and_then(|t| t.partitions.get(partition))
        .unwrap_or_else(|| panic!("no outcome for {table} {partition}"))
}

/// Asserts a partition ended in `expected` with the matching flags.
///
/// # Panics
///
/// Panics if the state or flags differ.
pub fn assert_outcome(
    state: &ArchivalState,
    table: &str,
    partition: &str,
    expected: PartitionState,
    expected_flags: Flags,
) {
    let outcome = outcome(state, table, partition);
    assert_eq!(
        outcome.state(),
        expected,
        "{table} {partition}: expected {expected}, got {} (error: {:?})",
        outcome.state(),
        outcome.error()
    );
    assert_eq!(flags(outcome), expected_flags, "{table} {partition}: flags");
}

/// Asserts the flag implications and sealing hold for every outcome.
///
/// # Panics
///
/// Panics if any outcome is unsealed, deleted without being inserted, or
/// rolled back without requiring it.
pub fn assert_outcome_invariants(state: &ArchivalState) {
    for (table, outcome) in state.outcomes() {
        let partition = outcome.partition();
        assert!(outcome.is_finished(), "{table} {partition} is not finished");
        assert!(
            !outcome.deleted_from_part1() || outcome.inserted_to_part2(),
            "{table} {partition} deleted without insert"
        );
        assert!(
            !outcome.rollback_succeeded() || outcome.rollback_required(),
            "{table} {partition} rolled back without requiring it"
        );
    }
}

/// Asserts no executed statement contains `fragment`.
///
/// # Panics
///
/// Panics if one does.
pub fn assert_no_statement_containing(gateway: &ScriptedGateway, fragment: &str) {
    let matching = gateway.statements_containing(fragment);
    assert!(
        matching.is_empty(),
        "expected no statement containing {fragment:?}, found {matching:?}"
    );
}

/// Asserts exactly `count` executed statements contain `fragment`.
///
/// # Panics
///
/// Panics if the count differs.
pub fn assert_statement_count(gateway: &ScriptedGateway, fragment: &str, count: usize) {
    let matching = gateway.statements_containing(fragment);
    assert_eq!(
        matching.len(),
        count,
        "statements containing {fragment:?}: {matching:#?}"
    );
}
