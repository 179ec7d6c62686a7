//! Schema metadata types for tables, columns and indexes.
//!
//! These are rebuilt from live metadata on every run and never cached.

use serde::{Deserialize, Serialize};

/// Name of the distinguished primary key index in MySQL metadata.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Normalized full type, e.g. "int unsigned", "varchar(64)", "decimal(10,2)".
    pub column_type: String,

    /// Base type without modifiers, e.g. "int", "varchar", "decimal".
    pub data_type: String,

    /// Whether an integer column is unsigned.
    pub is_unsigned: bool,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Column default as reported by the server. Informational only.
    pub default: Option<String>,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl Column {
    /// Build a column from raw metadata, normalizing the declared type.
    pub fn from_metadata(
        name: impl Into<String>,
        raw_column_type: &str,
        is_nullable: bool,
        default: Option<String>,
        ordinal_pos: i32,
    ) -> Self {
        let column_type = normalize_type(raw_column_type);
        let data_type = base_type(&column_type).to_string();
        let is_unsigned = column_type.split(' ').any(|t| t == "unsigned");
        Self {
            name: name.into(),
            column_type,
            data_type,
            is_unsigned,
            is_nullable,
            default,
            ordinal_pos,
        }
    }

    /// DATE, TIME, DATETIME, TIMESTAMP or YEAR.
    pub fn is_temporal(&self) -> bool {
        TEMPORAL_TYPES.contains(&self.data_type.as_str())
    }
}

/// Index metadata. The primary key is the index named [`PRIMARY_INDEX`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names in index order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,
}

impl Index {
    /// Whether this is the table's primary key.
    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_INDEX
    }
}

/// Columns used to order and partition a table's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonKey {
    /// Index the key was taken from.
    pub index_name: String,

    /// Key column definitions in index order.
    pub columns: Vec<Column>,
}

impl ComparisonKey {
    /// Key column names in index order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Database (schema) name.
    pub database: String,

    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// All indexes, including the primary key.
    pub indexes: Vec<Index>,

    /// Chosen comparison key, `None` for unorderable tables.
    pub comparison_key: Option<ComparisonKey>,
}

impl TableSchema {
    /// Assemble a schema and choose its comparison key.
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        mut columns: Vec<Column>,
        indexes: Vec<Index>,
    ) -> Self {
        columns.sort_by_key(|c| c.ordinal_pos);
        let comparison_key = choose_comparison_key(&columns, &indexes);
        Self {
            database: database.into(),
            name: name.into(),
            columns,
            indexes,
            comparison_key,
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        self.indexes.iter().any(Index::is_primary)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Primary key first, then the first unique index (by name) whose columns
/// are all NOT NULL. Unique indexes over nullable columns admit duplicate
/// NULL rows, so they cannot order the table.
fn choose_comparison_key(columns: &[Column], indexes: &[Index]) -> Option<ComparisonKey> {
    let resolve = |idx: &Index| -> Option<ComparisonKey> {
        let cols: Option<Vec<Column>> = idx
            .columns
            .iter()
            .map(|name| columns.iter().find(|c| &c.name == name).cloned())
            .collect();
        cols.filter(|c| !c.is_empty()).map(|columns| ComparisonKey {
            index_name: idx.name.clone(),
            columns,
        })
    };

    if let Some(pk) = indexes.iter().find(|i| i.is_primary()) {
        return resolve(pk);
    }

    let mut unique: Vec<&Index> = indexes.iter().filter(|i| i.is_unique).collect();
    unique.sort_by(|a, b| a.name.cmp(&b.name));
    unique
        .into_iter()
        .filter_map(resolve)
        .find(|key| key.columns.iter().all(|c| !c.is_nullable))
}

const INTEGER_TYPES: &[&str] = &["tinyint", "smallint", "mediumint", "int", "bigint", "year"];
const TEMPORAL_TYPES: &[&str] = &["date", "time", "datetime", "timestamp", "year"];

/// Normalize a declared column type so equivalent declarations compare equal.
///
/// - lowercase, single spaces
/// - integer display widths dropped (`int(11)` → `int`)
/// - synonyms folded (`integer` → `int`, `numeric` → `decimal`, ...)
/// - bare `decimal` expanded to `decimal(10,0)`
pub fn normalize_type(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let collapsed = if let Some(rest) = collapsed.strip_prefix("double precision") {
        format!("double{}", rest)
    } else if let Some(rest) = collapsed.strip_prefix("character varying") {
        format!("varchar{}", rest)
    } else {
        collapsed
    };

    // Split "name(args) modifiers" into its parts.
    let (name, args, modifiers) = match collapsed.find('(') {
        Some(open) => match collapsed.rfind(')') {
            Some(close) if close > open => (
                collapsed[..open].trim(),
                Some(collapsed[open + 1..close].trim().to_string()),
                collapsed[close + 1..].trim(),
            ),
            _ => (collapsed.as_str(), None, ""),
        },
        None => match collapsed.find(' ') {
            Some(space) => (&collapsed[..space], None, collapsed[space + 1..].trim()),
            None => (collapsed.as_str(), None, ""),
        },
    };

    let name = match name {
        "integer" => "int",
        "bool" | "boolean" => "tinyint",
        "numeric" | "dec" | "fixed" => "decimal",
        "real" => "double",
        other => other,
    };

    let args = if INTEGER_TYPES.contains(&name) {
        None
    } else if name == "decimal" && args.is_none() {
        Some("10,0".to_string())
    } else if name == "decimal" {
        args.map(|a| {
            let a = a.replace(' ', "");
            if a.contains(',') {
                a
            } else {
                format!("{},0", a)
            }
        })
    } else {
        args
    };

    let mut out = name.to_string();
    if let Some(args) = args {
        out.push('(');
        out.push_str(&args);
        out.push(')');
    }
    if !modifiers.is_empty() {
        out.push(' ');
        out.push_str(modifiers);
    }
    out
}

/// Base type name of a normalized column type.
fn base_type(column_type: &str) -> &str {
    let end = column_type
        .find(|c: char| c == '(' || c == ' ')
        .unwrap_or(column_type.len());
    &column_type[..end]
}
