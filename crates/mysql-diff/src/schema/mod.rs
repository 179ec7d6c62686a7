//! Schema introspection and structural comparison.

pub mod compare;
pub mod introspect;

pub use compare::{compare_schemas, SchemaComparison, SchemaDiscrepancy, Side};
pub use introspect::load_table;
