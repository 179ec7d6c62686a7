//! Database listing and system database filtering.

use crate::core::traits::Connection;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// Databases owned by the server itself, never compared.
pub const SYSTEM_DATABASES: &[&str] = &[
    "information_schema",
    "performance_schema",
    "mysql",
    "sys",
    "metrics_schema",
    "inspection_schema",
];

/// Whether `name` is a server-internal database (case-insensitive).
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES
        .iter()
        .any(|sys| sys.eq_ignore_ascii_case(name))
}

/// Every database name on one side, system databases included, in server
/// collation order.
pub async fn list_databases(conn: &dyn Connection, retry: &RetryPolicy) -> Result<Vec<String>> {
    retry
        .run(&format!("list databases on {}", conn.label()), || {
            conn.list_databases()
        })
        .await
}

/// User databases out of a full listing, order preserved.
pub fn user_databases(all: &[String]) -> Vec<String> {
    all.iter()
        .filter(|db| !is_system_database(db))
        .cloned()
        .collect()
}
