//! Database driver implementations of the [`Connection`](crate::core::Connection) facade.
//!
//! - [`mysql`]: MySQL-protocol servers via SQLx
//! - `memory`: in-memory tables used by the engine's unit tests

pub mod mysql;

#[cfg(test)]
pub(crate) mod memory;

pub use mysql::{MysqlConnection, MysqlDialect};
