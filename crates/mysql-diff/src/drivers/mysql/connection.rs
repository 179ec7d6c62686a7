//! MySQL implementation of the [`Connection`] facade.
//!
//! Uses SQLx for connection pooling and async query execution. All reads are
//! plain `SELECT`s; every call borrows one pooled connection for its duration.
//! Row digests are computed by the server, so a checksum call returns one row.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Row as _, ValueRef};
use tracing::{debug, info};

use super::dialect::{self, range_params, MysqlDialect};
use crate::config::{ConnectionConfig, DiffConfig};
use crate::core::digest::RangeDigest;
use crate::core::range::KeyRange;
use crate::core::schema::{Column, Index, TableSchema};
use crate::core::traits::Connection;
use crate::core::value::{KeyValue, SqlValue};
use crate::error::{DiffError, Result};

/// Pooled connection to one MySQL-protocol instance.
pub struct MysqlConnection {
    label: String,
    pool: MySqlPool,
    dialect: MysqlDialect,
}

impl MysqlConnection {
    /// Connect and verify the instance responds.
    ///
    /// `label` names the side ("url1", "url2") in logs and errors.
    pub async fn connect(
        label: impl Into<String>,
        config: &ConnectionConfig,
        diff: &DiffConfig,
    ) -> Result<Self> {
        let label = label.into();
        let connect_timeout = Duration::from_secs(diff.connect_timeout_secs);

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .ssl_mode(MySqlSslMode::Preferred);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }

        let pool_future = MySqlPoolOptions::new()
            .max_connections(diff.pool_size())
            .acquire_timeout(connect_timeout)
            .connect_with(options);
        let pool = tokio::time::timeout(connect_timeout, pool_future)
            .await
            .map_err(|_| {
                DiffError::connection(
                    &label,
                    format!("connecting to {} timed out after {:?}", config, connect_timeout),
                )
            })?
            .map_err(|e| DiffError::connection(&label, format!("{}: {}", config, e)))?;

        let conn = Self {
            label,
            pool,
            dialect: MysqlDialect::new(),
        };
        conn.ping()
            .await
            .map_err(|e| DiffError::connection(&conn.label, e))?;

        info!("Connected to {} ({})", conn.label, config);
        Ok(conn)
    }
}

/// Bind one value to a query.
fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue<'static>,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::U64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_ref()),
        SqlValue::Bytes(v) => query.bind(v.as_ref()),
        // compared against the temporal column, so the server parses it back
        SqlValue::Temporal(v) => query.bind(v.as_ref()),
    }
}

fn bind_range<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    range: &'q KeyRange,
) -> Query<'q, MySql, MySqlArguments> {
    for value in range_params(range) {
        query = bind_value(query, value);
    }
    query
}

const INTEGER_TYPES: &[&str] = &["tinyint", "smallint", "mediumint", "int", "bigint"];
const TEXT_TYPES: &[&str] = &[
    "char", "varchar", "tinytext", "text", "mediumtext", "longtext", "enum", "set",
];
const BINARY_TYPES: &[&str] = &[
    "binary", "varbinary", "tinyblob", "blob", "mediumblob", "longblob",
];

/// Decode one key cell according to its column type.
///
/// Temporal columns arrive as `CAST(... AS CHAR)` text. Decoding failures are
/// errors; a value is never silently turned into NULL.
fn decode_value(
    row: &MySqlRow,
    idx: usize,
    col: &Column,
    table: &TableSchema,
) -> Result<SqlValue<'static>> {
    let decode_err = |e: sqlx::Error| DiffError::decode(table.full_name(), &col.name, e);

    let raw = row.try_get_raw(idx).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let data_type = col.data_type.as_str();
    let value = if col.is_temporal() {
        SqlValue::Temporal(Cow::Owned(
            row.try_get::<String, _>(idx).map_err(decode_err)?,
        ))
    } else if INTEGER_TYPES.contains(&data_type) {
        if col.is_unsigned {
            SqlValue::U64(row.try_get::<u64, _>(idx).map_err(decode_err)?)
        } else {
            SqlValue::I64(row.try_get::<i64, _>(idx).map_err(decode_err)?)
        }
    } else if TEXT_TYPES.contains(&data_type) {
        SqlValue::Text(Cow::Owned(
            row.try_get::<String, _>(idx).map_err(decode_err)?,
        ))
    } else if BINARY_TYPES.contains(&data_type) {
        SqlValue::Bytes(Cow::Owned(
            row.try_get::<Vec<u8>, _>(idx).map_err(decode_err)?,
        ))
    } else {
        match data_type {
            "float" => SqlValue::F32(row.try_get::<f32, _>(idx).map_err(decode_err)?),
            "double" => SqlValue::F64(row.try_get::<f64, _>(idx).map_err(decode_err)?),
            "decimal" => SqlValue::Decimal(
                row.try_get::<rust_decimal::Decimal, _>(idx)
                    .map_err(decode_err)?,
            ),
            "json" => SqlValue::Text(Cow::Owned(
                row.try_get_unchecked::<String, _>(idx)
                    .map_err(decode_err)?,
            )),
            // bit, geometry and anything newer: keep the raw bytes
            _ => SqlValue::Bytes(Cow::Owned(
                row.try_get_unchecked::<Vec<u8>, _>(idx)
                    .map_err(decode_err)?,
            )),
        }
    };
    Ok(value)
}

fn decode_key(row: &MySqlRow, table: &TableSchema) -> Result<KeyValue> {
    let key = table
        .comparison_key
        .as_ref()
        .ok_or_else(|| DiffError::NoComparisonKey(table.full_name()))?;
    let values = key
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| decode_value(row, i, col, table))
        .collect::<Result<Vec<_>>>()?;
    Ok(KeyValue::new(values))
}

#[async_trait]
impl Connection for MysqlConnection {
    fn label(&self) -> &str {
        &self.label
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let rows: Vec<MySqlRow> = sqlx::query(dialect::LIST_DATABASES)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("SCHEMA_NAME")?) })
            .collect()
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let rows: Vec<MySqlRow> = sqlx::query(dialect::LIST_TABLES)
            .bind(database)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("TABLE_NAME")?) })
            .collect()
    }

    async fn load_columns(&self, database: &str, table: &str) -> Result<Vec<Column>> {
        let rows: Vec<MySqlRow> = sqlx::query(dialect::LOAD_COLUMNS)
            .bind(database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("COLUMN_NAME")?;
            let column_type: String = row.try_get("COLUMN_TYPE")?;
            let is_nullable: i64 = row.try_get("is_nullable")?;
            let default: Option<String> = row.try_get("COLUMN_DEFAULT")?;
            let ordinal_pos: i64 = row.try_get("ORDINAL_POSITION")?;
            let ordinal_pos = i32::try_from(ordinal_pos).map_err(|_| {
                DiffError::schema_read(
                    format!("{}.{}", database, table),
                    format!("ordinal position {} out of range", ordinal_pos),
                )
            })?;
            columns.push(Column::from_metadata(
                name,
                &column_type,
                is_nullable == 1,
                default,
                ordinal_pos,
            ));
        }
        Ok(columns)
    }

    async fn load_indexes(&self, database: &str, table: &str) -> Result<Vec<Index>> {
        let rows: Vec<MySqlRow> = sqlx::query(dialect::LOAD_INDEXES)
            .bind(database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        // Rows arrive ordered by index name, then sequence.
        let mut grouped: BTreeMap<String, Index> = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("INDEX_NAME")?;
            // Functional indexes have no column name.
            let column: Option<String> = row.try_get("COLUMN_NAME")?;
            let non_unique: i64 = row.try_get("NON_UNIQUE")?;
            let index = grouped.entry(name.clone()).or_insert_with(|| Index {
                name,
                columns: Vec::new(),
                is_unique: non_unique == 0,
            });
            index
                .columns
                .push(column.unwrap_or_else(|| "(expression)".to_string()));
        }
        Ok(grouped.into_values().collect())
    }

    async fn sample_keys(&self, table: &TableSchema, every: u64) -> Result<Vec<KeyValue>> {
        let sql = self.dialect.sample_keys(table)?;
        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .bind(every.max(1))
            .fetch_all(&self.pool)
            .await?;
        debug!(
            "{}: sampled {} keys from {}",
            self.label,
            rows.len(),
            table.full_name()
        );
        rows.iter().map(|row| decode_key(row, table)).collect()
    }

    async fn key_at_offset(
        &self,
        table: &TableSchema,
        range: &KeyRange,
        offset: u64,
    ) -> Result<Option<KeyValue>> {
        let sql = self.dialect.key_at_offset(table, range)?;
        let row: Option<MySqlRow> = bind_range(sqlx::query(&sql), range)
            .bind(offset)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_key(&row, table)).transpose()
    }

    async fn checksum_range(&self, table: &TableSchema, range: &KeyRange) -> Result<RangeDigest> {
        let sql = self.dialect.checksum_range(table, range)?;
        let row: MySqlRow = bind_range(sqlx::query(&sql), range)
            .fetch_one(&self.pool)
            .await?;

        let rows: i64 = row.try_get("__rows")?;
        let high: String = row.try_get("__high")?;
        let low: String = row.try_get("__low")?;
        let rows = u64::try_from(rows)
            .map_err(|e| DiffError::decode(table.full_name(), "__rows", e))?;
        RangeDigest::from_sums(rows, &high, &low)
            .map_err(|e| DiffError::decode(table.full_name(), "__high/__low", e))
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
