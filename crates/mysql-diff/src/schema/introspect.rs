//! Reads a table's definition from one connection.

use tracing::debug;

use crate::core::schema::TableSchema;
use crate::core::traits::Connection;
use crate::error::{DiffError, Result};
use crate::retry::RetryPolicy;

/// Load and normalize the schema of `database.table`.
///
/// A table without columns does not exist and yields
/// [`DiffError::TableNotFound`]; every other failure is reported as
/// [`DiffError::SchemaRead`].
pub async fn load_table(
    conn: &dyn Connection,
    retry: &RetryPolicy,
    database: &str,
    table: &str,
) -> Result<TableSchema> {
    let full_name = format!("{}.{}", database, table);
    let as_schema_err = |e: DiffError| DiffError::schema_read(&full_name, e);

    let columns = retry
        .run(&format!("load columns of {} on {}", full_name, conn.label()), || {
            conn.load_columns(database, table)
        })
        .await
        .map_err(as_schema_err)?;

    if columns.is_empty() {
        return Err(DiffError::TableNotFound {
            table: full_name.clone(),
            side: conn.label().to_string(),
        });
    }

    let indexes = retry
        .run(&format!("load indexes of {} on {}", full_name, conn.label()), || {
            conn.load_indexes(database, table)
        })
        .await
        .map_err(as_schema_err)?;

    let schema = TableSchema::new(database, table, columns, indexes);
    debug!(
        "{}: loaded {} columns, {} indexes from {}, comparison key {:?}",
        full_name,
        schema.columns.len(),
        schema.indexes.len(),
        conn.label(),
        schema
            .comparison_key
            .as_ref()
            .map(|k| k.column_names().join(","))
    );
    Ok(schema)
}
