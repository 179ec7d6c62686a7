//! Structural comparison of two table schemas.
//!
//! Columns are compared by name, normalized type and nullability; column
//! order is compared separately over the columns both sides share. Indexes
//! are compared as a set keyed by name. Defaults are not compared.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::core::schema::{Column, Index, TableSchema};

/// Which connection a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The other side.
    pub fn mirror(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// One structural difference between two table schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaDiscrepancy {
    ColumnOnlyOn {
        side: Side,
        column: String,
    },
    TypeMismatch {
        column: String,
        left: String,
        right: String,
    },
    NullabilityMismatch {
        column: String,
        left: bool,
        right: bool,
    },
    /// Shared columns appear in a different order.
    ColumnOrder {
        left: Vec<String>,
        right: Vec<String>,
    },
    IndexOnlyOn {
        side: Side,
        index: String,
    },
    /// Same index name, different columns or uniqueness.
    IndexDefinitionMismatch {
        index: String,
        left: Index,
        right: Index,
    },
}

impl SchemaDiscrepancy {
    /// The same finding seen with the arguments swapped.
    pub fn mirror(self) -> Self {
        use SchemaDiscrepancy::*;
        match self {
            ColumnOnlyOn { side, column } => ColumnOnlyOn {
                side: side.mirror(),
                column,
            },
            TypeMismatch {
                column,
                left,
                right,
            } => TypeMismatch {
                column,
                left: right,
                right: left,
            },
            NullabilityMismatch {
                column,
                left,
                right,
            } => NullabilityMismatch {
                column,
                left: right,
                right: left,
            },
            ColumnOrder { left, right } => ColumnOrder {
                left: right,
                right: left,
            },
            IndexOnlyOn { side, index } => IndexOnlyOn {
                side: side.mirror(),
                index,
            },
            IndexDefinitionMismatch { index, left, right } => IndexDefinitionMismatch {
                index,
                left: right,
                right: left,
            },
        }
    }
}

fn describe_index(index: &Index) -> String {
    format!(
        "{}({})",
        if index.is_unique { "unique " } else { "" },
        index.columns.join(", ")
    )
}

fn nullability(nullable: bool) -> &'static str {
    if nullable {
        "NULL"
    } else {
        "NOT NULL"
    }
}

impl fmt::Display for SchemaDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDiscrepancy::ColumnOnlyOn { side, column } => {
                write!(f, "column `{}` exists only on the {} side", column, side)
            }
            SchemaDiscrepancy::TypeMismatch {
                column,
                left,
                right,
            } => write!(f, "column `{}` type differs: {} vs {}", column, left, right),
            SchemaDiscrepancy::NullabilityMismatch {
                column,
                left,
                right,
            } => write!(
                f,
                "column `{}` nullability differs: {} vs {}",
                column,
                nullability(*left),
                nullability(*right)
            ),
            SchemaDiscrepancy::ColumnOrder { left, right } => write!(
                f,
                "column order differs: ({}) vs ({})",
                left.join(", "),
                right.join(", ")
            ),
            SchemaDiscrepancy::IndexOnlyOn { side, index } => {
                write!(f, "index `{}` exists only on the {} side", index, side)
            }
            SchemaDiscrepancy::IndexDefinitionMismatch { index, left, right } => write!(
                f,
                "index `{}` differs: {} vs {}",
                index,
                describe_index(left),
                describe_index(right)
            ),
        }
    }
}

/// Result of comparing two schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaComparison {
    pub discrepancies: Vec<SchemaDiscrepancy>,
}

impl SchemaComparison {
    /// Whether the schemas are structurally equal.
    pub fn is_equal(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// The comparison with sides swapped.
    pub fn mirror(self) -> Self {
        Self {
            discrepancies: self
                .discrepancies
                .into_iter()
                .map(SchemaDiscrepancy::mirror)
                .collect(),
        }
    }
}

/// Compare two schemas. Pure and symmetric: `compare(b, a)` equals
/// `compare(a, b).mirror()`.
pub fn compare_schemas(left: &TableSchema, right: &TableSchema) -> SchemaComparison {
    let mut discrepancies = Vec::new();

    let left_cols: BTreeMap<&str, &Column> =
        left.columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let right_cols: BTreeMap<&str, &Column> =
        right.columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let names: BTreeSet<&str> = left_cols.keys().chain(right_cols.keys()).copied().collect();

    for name in names {
        match (left_cols.get(name), right_cols.get(name)) {
            (Some(l), Some(r)) => {
                if l.column_type != r.column_type {
                    discrepancies.push(SchemaDiscrepancy::TypeMismatch {
                        column: name.to_string(),
                        left: l.column_type.clone(),
                        right: r.column_type.clone(),
                    });
                }
                if l.is_nullable != r.is_nullable {
                    discrepancies.push(SchemaDiscrepancy::NullabilityMismatch {
                        column: name.to_string(),
                        left: l.is_nullable,
                        right: r.is_nullable,
                    });
                }
            }
            (Some(_), None) => discrepancies.push(SchemaDiscrepancy::ColumnOnlyOn {
                side: Side::Left,
                column: name.to_string(),
            }),
            (None, Some(_)) => discrepancies.push(SchemaDiscrepancy::ColumnOnlyOn {
                side: Side::Right,
                column: name.to_string(),
            }),
            (None, None) => {}
        }
    }

    let shared_order = |cols: &[Column], other: &BTreeMap<&str, &Column>| -> Vec<String> {
        cols.iter()
            .filter(|c| other.contains_key(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    };
    let left_order = shared_order(&left.columns, &right_cols);
    let right_order = shared_order(&right.columns, &left_cols);
    if left_order != right_order {
        discrepancies.push(SchemaDiscrepancy::ColumnOrder {
            left: left_order,
            right: right_order,
        });
    }

    let left_idx: BTreeMap<&str, &Index> =
        left.indexes.iter().map(|i| (i.name.as_str(), i)).collect();
    let right_idx: BTreeMap<&str, &Index> =
        right.indexes.iter().map(|i| (i.name.as_str(), i)).collect();
    let index_names: BTreeSet<&str> = left_idx.keys().chain(right_idx.keys()).copied().collect();

    for name in index_names {
        match (left_idx.get(name), right_idx.get(name)) {
            (Some(l), Some(r)) => {
                if l.columns != r.columns || l.is_unique != r.is_unique {
                    discrepancies.push(SchemaDiscrepancy::IndexDefinitionMismatch {
                        index: name.to_string(),
                        left: (*l).clone(),
                        right: (*r).clone(),
                    });
                }
            }
            (Some(_), None) => discrepancies.push(SchemaDiscrepancy::IndexOnlyOn {
                side: Side::Left,
                index: name.to_string(),
            }),
            (None, Some(_)) => discrepancies.push(SchemaDiscrepancy::IndexOnlyOn {
                side: Side::Right,
                index: name.to_string(),
            }),
            (None, None) => {}
        }
    }

    SchemaComparison { discrepancies }
}
