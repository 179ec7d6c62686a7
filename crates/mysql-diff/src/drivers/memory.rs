//! In-memory [`Connection`] for engine tests.
//!
//! Tables live in nested maps keyed by database and table name. Keys are
//! ordered with [`cmp_values`], which understands the value kinds tests use.
//! Failures can be injected per operation to exercise the retry policy, and
//! checksums of chosen tables can be slowed down to observe scheduling.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::digest::RangeDigest;
use crate::core::range::KeyRange;
use crate::core::schema::tests::{make_column, not_null};
use crate::core::schema::{Column, Index, TableSchema, PRIMARY_INDEX};
use crate::core::traits::Connection;
use crate::core::value::{KeyValue, Row, SqlValue};
use crate::error::{DiffError, Result};

#[derive(Debug, Clone)]
pub(crate) struct MemTable {
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub rows: Vec<Row>,
}

impl MemTable {
    /// `id int NOT NULL PRIMARY KEY, name varchar(32)` holding the given rows.
    pub fn keyed(rows: &[(i64, &str)]) -> Self {
        Self {
            columns: vec![
                not_null(make_column("id", "int", 1)),
                make_column("name", "varchar(32)", 2),
            ],
            indexes: vec![Index {
                name: PRIMARY_INDEX.into(),
                columns: vec!["id".into()],
                is_unique: true,
            }],
            rows: rows
                .iter()
                .map(|(id, name)| {
                    vec![
                        SqlValue::I64(*id),
                        SqlValue::Text(Cow::Owned(name.to_string())),
                    ]
                })
                .collect(),
        }
    }

    /// A single nullable `v int` column with no indexes.
    pub fn unkeyed(values: &[i64]) -> Self {
        Self {
            columns: vec![make_column("v", "int", 1)],
            indexes: vec![],
            rows: values.iter().map(|v| vec![SqlValue::I64(*v)]).collect(),
        }
    }
}

pub(crate) struct MemoryConnection {
    label: String,
    databases: BTreeMap<String, BTreeMap<String, MemTable>>,
    reverse_rows: bool,
    fold_case: bool,
    delays: HashMap<String, Duration>,
    failures: Mutex<HashMap<&'static str, u32>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    finished: Mutex<HashMap<String, usize>>,
    returned: Mutex<u64>,
    active: Mutex<HashMap<String, usize>>,
    peak: Mutex<usize>,
}

/// Marks a table as having a checksum in flight until dropped.
struct InFlight<'a> {
    conn: &'a MemoryConnection,
    table: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut active = self.conn.active.lock().unwrap();
        if let Some(count) = active.get_mut(&self.table) {
            *count -= 1;
            if *count == 0 {
                active.remove(&self.table);
            }
        }
    }
}

impl MemoryConnection {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            databases: BTreeMap::new(),
            reverse_rows: false,
            fold_case: false,
            delays: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
            returned: Mutex::new(0),
            active: Mutex::new(HashMap::new()),
            peak: Mutex::new(0),
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.databases.entry(database.to_string()).or_default();
        self
    }

    pub fn with_table(mut self, database: &str, table: &str, data: MemTable) -> Self {
        self.databases
            .entry(database.to_string())
            .or_default()
            .insert(table.to_string(), data);
        self
    }

    /// Visit rows in descending stored order when checksumming.
    pub fn with_reversed_rows(mut self) -> Self {
        self.reverse_rows = true;
        self
    }

    /// Compare text keys case-insensitively, like a `_ci` collation.
    pub fn with_case_insensitive_keys(mut self) -> Self {
        self.fold_case = true;
        self
    }

    /// Make every checksum of `table` take `delay`.
    pub fn with_delay(mut self, table: &str, delay: Duration) -> Self {
        self.delays.insert(table.to_string(), delay);
        self
    }

    /// Make the next `times` calls of `op` fail with a transient error.
    pub fn fail_times(self, op: &'static str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(op, times);
        self
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Checksums of `table` that ran to completion.
    pub fn finished(&self, table: &str) -> usize {
        self.finished.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    /// Result rows sent back across all calls.
    pub fn rows_returned(&self) -> u64 {
        *self.returned.lock().unwrap()
    }

    /// Most distinct tables with a checksum in flight at the same time.
    pub fn peak_tables(&self) -> usize {
        *self.peak.lock().unwrap()
    }

    fn track(&self, table: &str) -> InFlight<'_> {
        let mut active = self.active.lock().unwrap();
        *active.entry(table.to_string()).or_insert(0) += 1;
        let mut peak = self.peak.lock().unwrap();
        *peak = (*peak).max(active.len());
        InFlight {
            conn: self,
            table: table.to_string(),
        }
    }

    fn returning(&self, rows: usize) {
        *self.returned.lock().unwrap() += rows as u64;
    }

    fn enter(&self, op: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(op) {
            if *left > 0 {
                *left -= 1;
                return Err(DiffError::Query(sqlx::Error::PoolTimedOut));
            }
        }
        Ok(())
    }

    fn table(&self, schema: &TableSchema) -> Result<&MemTable> {
        self.databases
            .get(&schema.database)
            .and_then(|tables| tables.get(&schema.name))
            .ok_or_else(|| DiffError::TableNotFound {
                table: schema.full_name(),
                side: self.label.clone(),
            })
    }

    /// Rows of `schema` inside `range` paired with their keys, in key order.
    fn keyed_rows(&self, schema: &TableSchema, range: &KeyRange) -> Result<Vec<(KeyValue, Row)>> {
        let data = self.table(schema)?;
        let key = schema
            .comparison_key
            .as_ref()
            .ok_or_else(|| DiffError::NoComparisonKey(schema.full_name()))?;
        let positions: Vec<usize> = key
            .columns
            .iter()
            .filter_map(|k| data.columns.iter().position(|c| c.name == k.name))
            .collect();

        let mut rows: Vec<(KeyValue, Row)> = data
            .rows
            .iter()
            .map(|row| {
                let key = KeyValue::new(positions.iter().map(|&i| row[i].clone()).collect());
                (key, row.clone())
            })
            .filter(|(key, _)| in_range(key, range, self.fold_case))
            .collect();
        rows.sort_by(|a, b| cmp_keys(&a.0, &b.0, self.fold_case));
        Ok(rows)
    }
}

pub(crate) fn cmp_values(a: &SqlValue<'_>, b: &SqlValue<'_>, fold_case: bool) -> Ordering {
    match (a, b) {
        (SqlValue::I64(x), SqlValue::I64(y)) => x.cmp(y),
        (SqlValue::U64(x), SqlValue::U64(y)) => x.cmp(y),
        (SqlValue::Text(x), SqlValue::Text(y)) if fold_case => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

pub(crate) fn cmp_keys(a: &KeyValue, b: &KeyValue, fold_case: bool) -> Ordering {
    a.values()
        .iter()
        .zip(b.values())
        .map(|(x, y)| cmp_values(x, y, fold_case))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn in_range(key: &KeyValue, range: &KeyRange, fold_case: bool) -> bool {
    let above = range
        .lower
        .as_ref()
        .map_or(true, |lo| cmp_keys(key, lo, fold_case) != Ordering::Less);
    let below = range
        .upper
        .as_ref()
        .map_or(true, |hi| cmp_keys(key, hi, fold_case) == Ordering::Less);
    above && below
}

#[async_trait]
impl Connection for MemoryConnection {
    fn label(&self) -> &str {
        &self.label
    }

    async fn ping(&self) -> Result<()> {
        self.enter("ping")
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        self.enter("list_databases")?;
        Ok(self.databases.keys().cloned().collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.enter("list_tables")?;
        Ok(self
            .databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_columns(&self, database: &str, table: &str) -> Result<Vec<Column>> {
        self.enter("load_columns")?;
        Ok(self
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn load_indexes(&self, database: &str, table: &str) -> Result<Vec<Index>> {
        self.enter("load_indexes")?;
        Ok(self
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .map(|t| t.indexes.clone())
            .unwrap_or_default())
    }

    async fn sample_keys(&self, table: &TableSchema, every: u64) -> Result<Vec<KeyValue>> {
        self.enter("sample_keys")?;
        let rows = self.keyed_rows(table, &KeyRange::full())?;
        let keys: Vec<KeyValue> = rows
            .into_iter()
            .step_by(every.max(1) as usize)
            .map(|(key, _)| key)
            .collect();
        self.returning(keys.len());
        Ok(keys)
    }

    async fn key_at_offset(
        &self,
        table: &TableSchema,
        range: &KeyRange,
        offset: u64,
    ) -> Result<Option<KeyValue>> {
        self.enter("key_at_offset")?;
        let rows = self.keyed_rows(table, range)?;
        let key = rows.into_iter().nth(offset as usize).map(|(key, _)| key);
        self.returning(usize::from(key.is_some()));
        Ok(key)
    }

    async fn checksum_range(&self, table: &TableSchema, range: &KeyRange) -> Result<RangeDigest> {
        self.enter("checksum_range")?;
        let _in_flight = self.track(&table.name);
        if let Some(delay) = self.delays.get(&table.name) {
            tokio::time::sleep(*delay).await;
        }

        let mut rows: Vec<Row> = if range.is_full() {
            self.table(table)?.rows.clone()
        } else {
            self.keyed_rows(table, range)?
                .into_iter()
                .map(|(_, row)| row)
                .collect()
        };
        if self.reverse_rows {
            rows.reverse();
        }
        let digest = RangeDigest::from_rows(rows.iter().map(Vec::as_slice));

        *self
            .finished
            .lock()
            .unwrap()
            .entry(table.name.clone())
            .or_insert(0) += 1;
        self.returning(1);
        Ok(digest)
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
