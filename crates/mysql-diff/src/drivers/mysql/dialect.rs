//! MySQL SQL builders for the read-only queries the engine issues.
//!
//! Every builder returns SQL with `?` placeholders. Range bounds bind the
//! lower key values first, then the upper key values, each in key order.
//! Composite keys use row constructors so `(a, b) >= (?, ?)` compares in the
//! same lexicographic order as `ORDER BY a, b`.
//!
//! Key reads return temporal columns as `CAST(... AS CHAR)` and alias every
//! output column `__k<n>`, so `ORDER BY` still sees the raw column.

use crate::core::range::KeyRange;
use crate::core::schema::{Column, TableSchema};
use crate::core::value::SqlValue;
use crate::error::{DiffError, Result};

/// Lists every database visible to the user.
pub const LIST_DATABASES: &str = r#"
    SELECT CAST(SCHEMA_NAME AS CHAR(255)) AS SCHEMA_NAME
    FROM INFORMATION_SCHEMA.SCHEMATA
    ORDER BY SCHEMA_NAME
"#;

/// Lists base tables of one database.
pub const LIST_TABLES: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

/// Column metadata. CASTs avoid collation and integer width differences
/// between server versions.
pub const LOAD_COLUMNS: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE,
        CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR) AS COLUMN_DEFAULT,
        CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

/// Index metadata, one row per indexed column.
pub const LOAD_INDEXES: &str = r#"
    SELECT
        CAST(INDEX_NAME AS CHAR(255)) AS INDEX_NAME,
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(NON_UNIQUE AS SIGNED) AS NON_UNIQUE
    FROM INFORMATION_SCHEMA.STATISTICS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

/// MySQL dialect: identifier quoting and query building.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Quote an identifier with backticks, doubling embedded backticks.
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Database-qualified, quoted table name.
    pub fn qualified_table(&self, table: &TableSchema) -> String {
        format!(
            "{}.{}",
            self.quote_ident(&table.database),
            self.quote_ident(&table.name)
        )
    }

    fn key_columns(&self, table: &TableSchema) -> Result<Vec<String>> {
        let key = table
            .comparison_key
            .as_ref()
            .ok_or_else(|| DiffError::NoComparisonKey(table.full_name()))?;
        Ok(key
            .columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect())
    }

    /// Key columns as read back by key queries, aliased `__k0`, `__k1`, ...
    fn key_outputs(&self, table: &TableSchema) -> Result<String> {
        let key = table
            .comparison_key
            .as_ref()
            .ok_or_else(|| DiffError::NoComparisonKey(table.full_name()))?;
        Ok(key
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let col = self.quote_ident(&c.name);
                if c.is_temporal() {
                    format!("CAST({} AS CHAR) AS `__k{}`", col, i)
                } else {
                    format!("{} AS `__k{}`", col, i)
                }
            })
            .collect::<Vec<_>>()
            .join(", "))
    }

    /// Canonical encoding of one column as a SQL expression; see
    /// [`crate::core::value`] for the byte layout.
    fn canonical_column(&self, column: &Column) -> String {
        let col = self.quote_ident(&column.name);
        // CAST(json AS BINARY) would expose the server's internal format.
        let text = if column.data_type == "json" {
            format!("CAST(CAST({} AS CHAR) AS BINARY)", col)
        } else {
            format!("CAST({} AS BINARY)", col)
        };
        format!(
            "IF({col} IS NULL, 'N', CONCAT('V', LENGTH({text}), ':', {text}))",
            col = col,
            text = text
        )
    }

    /// `WHERE` conditions for a range over the given quoted key columns,
    /// or `None` for an unbounded range.
    pub fn range_condition(&self, key_cols: &[String], range: &KeyRange) -> Option<String> {
        let (lhs, placeholders) = if key_cols.len() == 1 {
            (key_cols[0].clone(), "?".to_string())
        } else {
            (
                format!("({})", key_cols.join(", ")),
                format!("({})", vec!["?"; key_cols.len()].join(", ")),
            )
        };

        let mut conditions = Vec::with_capacity(2);
        if range.lower.is_some() {
            conditions.push(format!("{} >= {}", lhs, placeholders));
        }
        if range.upper.is_some() {
            conditions.push(format!("{} < {}", lhs, placeholders));
        }

        if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        }
    }

    /// Row count and the two summed digest halves of the rows inside `range`.
    ///
    /// Returns one row: `__rows` (signed) and `__high`, `__low` (decimal text).
    /// Unkeyed tables only accept the full range.
    pub fn checksum_range(&self, table: &TableSchema, range: &KeyRange) -> Result<String> {
        let encoded = table
            .columns
            .iter()
            .map(|c| self.canonical_column(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut inner = format!(
            "SELECT SHA2(CONCAT({}), 256) AS `__h` FROM {}",
            encoded,
            self.qualified_table(table)
        );
        if !range.is_full() {
            let key_cols = self.key_columns(table)?;
            if let Some(cond) = self.range_condition(&key_cols, range) {
                inner.push_str(" WHERE ");
                inner.push_str(&cond);
            }
        }
        let half = |start: u32| {
            format!(
                "CAST(COALESCE(SUM(CAST(CONV(SUBSTRING(`__h`, {}, 16), 16, 10) AS UNSIGNED)), 0) AS CHAR)",
                start
            )
        };
        Ok(format!(
            "SELECT CAST(COUNT(*) AS SIGNED) AS `__rows`, {} AS `__high`, {} AS `__low` FROM ({}) AS `__c`",
            half(1),
            half(17),
            inner
        ))
    }

    /// Every n-th key in key order; binds the step.
    ///
    /// Only the key columns are read so the window runs over the index.
    pub fn sample_keys(&self, table: &TableSchema) -> Result<String> {
        let key_cols = self.key_columns(table)?.join(", ");
        Ok(format!(
            "SELECT {outputs} FROM (SELECT {cols}, ROW_NUMBER() OVER (ORDER BY {cols}) AS `__rn` FROM {table}) AS `__s` WHERE MOD(`__rn` - 1, ?) = 0 ORDER BY `__rn`",
            outputs = self.key_outputs(table)?,
            cols = key_cols,
            table = self.qualified_table(table)
        ))
    }

    /// The key at a bound offset inside `range`; binds range bounds, then the offset.
    pub fn key_at_offset(&self, table: &TableSchema, range: &KeyRange) -> Result<String> {
        let key_cols = self.key_columns(table)?;
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.key_outputs(table)?,
            self.qualified_table(table)
        );
        if let Some(cond) = self.range_condition(&key_cols, range) {
            sql.push_str(" WHERE ");
            sql.push_str(&cond);
        }
        sql.push_str(&format!(" ORDER BY {} LIMIT 1 OFFSET ?", key_cols.join(", ")));
        Ok(sql)
    }
}

/// Values to bind for a range, in placeholder order.
pub fn range_params(range: &KeyRange) -> Vec<&SqlValue<'static>> {
    range
        .lower
        .iter()
        .chain(range.upper.iter())
        .flat_map(|k| k.values())
        .collect()
}
