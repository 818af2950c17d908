//! Shared test utilities for coldstore tests.
//!
//! This crate provides:
//! - [`ScriptedGateway`]: A warehouse gateway answering from scripts and
//!   recording every call
//! - Fixtures: beeline DDL dumps and pre-wired warehouses
//! - Custom assertion helpers for partition outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use coldstore_test_utils::{orders_warehouse, assert_outcome_invariants};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let gateway = orders_warehouse(&["d=2024-01-01"]);
//!     gateway.script_counts("sales.orders", [100_u64, 0]);
//!     // ... run the engine ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod gateway;

pub use assertions::*;
pub use fixtures::*;
pub use gateway::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("coldstore_archive=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
