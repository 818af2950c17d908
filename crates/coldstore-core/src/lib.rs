//! # coldstore-core
//!
//! Core abstractions for coldstore, the two-phase partition archiver.
//!
//! This crate provides the primitives shared by the archival engine and the CLI:
//!
//! - **Partition Keys**: Ordered partition column/value mappings with the
//!   warehouse's `col=value/col=value` naming
//! - **Partition Selection**: Filters deciding which partitions a run archives
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and standard spans
//!
//! ## Example
//!
//! ```rust
//! use coldstore_core::prelude::*;
//!
//! let key = PartitionKey::parse_name("load_date=2024-01-01/region=us").unwrap();
//! assert_eq!(key.get("region"), Some("us"));
//! assert_eq!(key.to_string(), "load_date=2024-01-01/region=us");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod observability;
pub mod partition;
pub mod selector;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::partition::{PartitionKey, PartitionKeyParseError};
    pub use crate::selector::PartitionSelector;
}

pub use error::{Error, Result};
pub use observability::{LogFormat, archive_span, init_logging, partition_span};
pub use partition::{PartitionKey, PartitionKeyParseError};
pub use selector::PartitionSelector;
