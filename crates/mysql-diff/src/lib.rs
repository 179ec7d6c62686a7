//! # mysql-diff
//!
//! Consistency checker for two MySQL-compatible databases.
//!
//! The library compares table definitions and row contents between two
//! instances without copying data between them:
//!
//! - **Schema comparison** of columns, types, nullability and indexes
//! - **Chunked checksums** over comparison-key ranges, computed by each server
//!   so only counts, digests and keys cross the network
//! - **Bisection** of mismatched chunks down to individual row keys
//! - **Parallel tables** with a bounded worker pool and fail-fast cancellation
//! - **Retries** with exponential backoff for transient read failures
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mysql_diff::{ConnectionConfig, DatabaseSelection, DiffConfig, Differ, MysqlConnection};
//!
//! #[tokio::main]
//! async fn main() -> mysql_diff::Result<()> {
//!     let diff = DiffConfig::default();
//!     let left = ConnectionConfig::from_url("root@127.0.0.1:4000")?;
//!     let right = ConnectionConfig::from_url("root:secret@10.0.0.2:3306")?;
//!     let left = Arc::new(MysqlConnection::connect("url1", &left, &diff).await?);
//!     let right = Arc::new(MysqlConnection::connect("url2", &right, &diff).await?);
//!
//!     let report = Differ::new(left, right, diff)
//!         .run(&DatabaseSelection::from_list("shop"))
//!         .await?;
//!     println!("{}", report.is_equal());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod core;
pub mod diff;
pub mod drivers;
pub mod error;
pub mod partition;
pub mod report;
pub mod retry;
pub mod schema;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, DatabaseSelection, DiffConfig, RetryConfig};
pub use crate::core::{Connection, KeyRange, KeyValue, RangeDigest, SqlValue, TableSchema};
pub use diff::Differ;
pub use drivers::MysqlConnection;
pub use error::{DiffError, Result};
pub use report::{DatabaseReport, Divergence, Mismatch, RunReport, TableReport, TableVerdict};
pub use retry::RetryPolicy;
