//! Core abstractions shared by every part of the engine.
//!
//! - [`schema`]: table, column and index metadata
//! - [`value`]: typed SQL values and their canonical encoding
//! - [`digest`]: order-independent row set digests
//! - [`range`]: key ranges over a comparison key
//! - [`traits`]: the [`Connection`] facade implemented by drivers

pub mod digest;
pub mod range;
pub mod schema;
pub mod traits;
pub mod value;

pub use digest::RangeDigest;
pub use range::KeyRange;
pub use schema::{Column, ComparisonKey, Index, TableSchema, PRIMARY_INDEX};
pub use traits::Connection;
pub use value::{KeyValue, Row, SqlValue};
