//! MySQL-protocol driver (MySQL 8.0+, TiDB, MariaDB 10.2+).
//!
//! - [`MysqlDialect`]: SQL builders for metadata, sampling and ranged reads
//! - [`MysqlConnection`]: [`Connection`](crate::core::Connection) over a SQLx pool
//!
//! Key sampling uses `ROW_NUMBER()`, so servers without window functions
//! are not supported.

mod connection;
mod dialect;

pub use connection::MysqlConnection;
pub use dialect::MysqlDialect;
