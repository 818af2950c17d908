//! # coldstore-archive
//!
//! Two-phase partition archival for a Hive warehouse.
//!
//! Selected partitions of a primary ("part1") table are copied into a
//! secondary ("part2") table, verified by row count, and only then dropped
//! from part1. A drop that cannot be confirmed is rolled back by removing the
//! part2 copy.
//!
//! - **Schema Derivation**: Turns a `SHOW CREATE TABLE` dump into the part2
//!   table definition with an extra insertion-time partition column
//! - **Archival Engine**: Per-partition insert, verify, delete, rollback
//! - **Outcomes**: An explicit state machine per partition
//! - **Summaries**: Per-table and overall report lines
//! - **Gateway**: The warehouse boundary, with a `beeline` implementation
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use coldstore_archive::{
//!     ArchivalConfig, ArchivalEngine, BeelineGateway, GatewayConfig, summarize,
//! };
//! use coldstore_core::PartitionSelector;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = BeelineGateway::new(GatewayConfig::from_env()?);
//! let engine = ArchivalEngine::new(gateway, ArchivalConfig::default());
//! let selector = PartitionSelector::all().with_before("load_date", "2024-01-01");
//! let state = engine
//!     .run("sales", &["orders".to_string()], &selector, Utc::now())
//!     .await;
//! println!("{}", summarize(&state));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod beeline;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod oplog;
pub mod outcome;
pub mod query;
pub mod schema;
pub mod summary;

pub use beeline::BeelineGateway;
pub use config::{ArchivalConfig, GatewayConfig, WarehouseConnection};
pub use engine::{ArchivalEngine, PreparedTable};
pub use error::{ArchiveError, GatewayError, Result};
pub use gateway::WarehouseGateway;
pub use oplog::{LogRecord, OperationLog};
pub use outcome::{ArchivalState, PartitionOutcome, PartitionState, TableArchival};
pub use schema::{DerivedSchema, PART2_INSERTION_TIME_COLUMN, derive_target_schema};
pub use summary::{ArchivalSummary, OutcomeCounts, TableSummary, summarize};
