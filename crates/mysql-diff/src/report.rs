//! Comparison results at table, database and run level.
//!
//! Every type serializes to JSON so a run can be archived with `--report`.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::range::KeyRange;
use crate::core::value::KeyValue;
use crate::error::Result;
use crate::schema::SchemaDiscrepancy;

/// Where two tables' rows differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// A single row, located by its comparison key.
    Row {
        key: KeyValue,
        on_left: bool,
        on_right: bool,
    },

    /// A key range that differs but was not narrowed further.
    Range {
        range: KeyRange,
        left_rows: u64,
        right_rows: u64,
    },

    /// The whole table differs; it has no key to narrow with.
    Table { left_rows: u64, right_rows: u64 },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Row {
                key,
                on_left: true,
                on_right: true,
            } => write!(f, "row {} differs", key),
            Divergence::Row {
                key,
                on_left: true,
                ..
            } => write!(f, "row {} missing on right", key),
            Divergence::Row { key, .. } => write!(f, "row {} missing on left", key),
            Divergence::Range {
                range,
                left_rows,
                right_rows,
            } => write!(
                f,
                "range {} differs ({} vs {} rows)",
                range, left_rows, right_rows
            ),
            Divergence::Table {
                left_rows,
                right_rows,
            } => write!(f, "table differs ({} vs {} rows)", left_rows, right_rows),
        }
    }
}

/// Why two tables are not equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    Schema {
        discrepancies: Vec<SchemaDiscrepancy>,
    },
    Rows {
        divergences: Vec<Divergence>,
    },
}

/// Outcome for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableVerdict {
    Equal,
    NotEqual { mismatch: Mismatch },
    Error { reason: String },
}

impl TableVerdict {
    pub fn is_equal(&self) -> bool {
        matches!(self, TableVerdict::Equal)
    }
}

/// Result and statistics for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub database: String,
    pub table: String,
    pub verdict: TableVerdict,
    /// Chunks checksummed in the first pass.
    pub chunks: usize,
    pub mismatched_chunks: usize,
    pub left_rows: u64,
    pub right_rows: u64,
    pub duration_ms: u64,
}

impl TableReport {
    /// Report for a table that never reached row comparison.
    pub fn new(database: &str, table: &str, verdict: TableVerdict) -> Self {
        Self {
            database: database.to_string(),
            table: table.to_string(),
            verdict,
            chunks: 0,
            mismatched_chunks: 0,
            left_rows: 0,
            right_rows: 0,
            duration_ms: 0,
        }
    }

    pub fn is_equal(&self) -> bool {
        self.verdict.is_equal()
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Result for one database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseReport {
    pub database: String,
    /// Completed tables in name order.
    pub tables: Vec<TableReport>,
    /// Tables never completed because a sibling failed first.
    pub abandoned: Vec<String>,
    /// Set when the database could not be compared at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseReport {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            tables: Vec::new(),
            abandoned: Vec::new(),
            error: None,
        }
    }

    /// Equal only if every table completed and matched.
    pub fn is_equal(&self) -> bool {
        self.error.is_none() && self.abandoned.is_empty() && self.tables.iter().all(TableReport::is_equal)
    }
}

/// The two database lists of an all-databases run that did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSetMismatch {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub equal: bool,
    pub databases: Vec<DatabaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_sets_differ: Option<DatabaseSetMismatch>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Empty report for a run starting now.
    pub fn begin() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Stamp completion and compute the overall verdict.
    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.duration_ms = (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.equal = self.database_sets_differ.is_none()
            && self.databases.iter().all(DatabaseReport::is_equal);
        self
    }

    pub fn is_equal(&self) -> bool {
        self.equal
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to a file.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_table(name: &str) -> TableReport {
        TableReport::new("d1", name, TableVerdict::Equal)
    }

    #[test]
    fn test_database_equal_requires_all_tables() {
        let mut db = DatabaseReport::new("d1");
        db.tables.push(equal_table("a"));
        assert!(db.is_equal());

        db.abandoned.push("b".into());
        assert!(!db.is_equal());

        let mut db = DatabaseReport::new("d1");
        db.tables.push(TableReport::new(
            "d1",
            "a",
            TableVerdict::Error {
                reason: "boom".into(),
            },
        ));
        assert!(!db.is_equal());
    }

    #[test]
    fn test_run_verdict() {
        let mut db = DatabaseReport::new("d1");
        db.tables.push(equal_table("a"));
        let run = RunReport {
            databases: vec![db],
            ..RunReport::begin()
        }
        .finish();
        assert!(run.is_equal());
        assert!(run.completed_at >= run.started_at);
        assert_eq!(run.run_id.len(), 36);

        let run = RunReport {
            database_sets_differ: Some(DatabaseSetMismatch {
                left: vec!["a".into()],
                right: vec![],
            }),
            ..RunReport::begin()
        }
        .finish();
        assert!(!run.is_equal());
    }

    #[test]
    fn test_divergence_display() {
        let row = Divergence::Row {
            key: KeyValue::from(7),
            on_left: true,
            on_right: false,
        };
        assert_eq!(row.to_string(), "row 7 missing on right");
        let range = Divergence::Range {
            range: KeyRange::new(Some(KeyValue::from(1)), None),
            left_rows: 3,
            right_rows: 2,
        };
        assert_eq!(range.to_string(), "range [1, +inf) differs (3 vs 2 rows)");
    }

    #[test]
    fn test_json_shape() {
        let report = TableReport::new(
            "d1",
            "t1",
            TableVerdict::NotEqual {
                mismatch: Mismatch::Rows {
                    divergences: vec![Divergence::Row {
                        key: KeyValue::from("k"),
                        on_left: true,
                        on_right: true,
                    }],
                },
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"]["status"], "not_equal");
        assert_eq!(json["verdict"]["mismatch"]["kind"], "rows");
        assert_eq!(json["verdict"]["mismatch"]["divergences"][0]["key"][0], "'k'");
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        RunReport::begin().finish().write_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"equal\": true"));
        assert!(text.contains("\"started_at\""));
    }
}
