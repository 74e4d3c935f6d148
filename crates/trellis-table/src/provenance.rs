//! Transform tags and per-table diagnostics.
//!
//! Every derived table records the category of the transform that produced it
//! plus a human-readable description. The chain is purely diagnostic: no
//! later transform depends on it for correctness.

use serde::{Deserialize, Serialize};

/// Category of the operation that produced a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    LoadFromDelimited,
    LoadFromMatrix,
    LoadFromRowStore,
    LoadFromColumnStore,
    FilterRows,
    FilterColumns,
    InverseFilterRows,
    InverseFilterColumns,
    SortRows,
    SortColumns,
    RenameColumns,
    UpdateColumnDefs,
    UpdateRows,
    AppendColumns,
    CombineColumns,
    Concat,
    Transpose,
    Reduce,
    Complete,
}

/// Diagnostic snapshot of one table in a derivation chain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableTrace {
    pub description: String,
    pub transform: TransformType,
    pub num_rows: usize,
    pub num_columns: usize,
    pub num_valid_cells: usize,
    pub num_error_values: usize,
    /// Time spent materializing this table's column store, in microseconds.
    pub load_micros: u128,
    /// True when the store is the parent's store, shared by reference.
    pub store_shared_with_parent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transform_types_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransformType::LoadFromDelimited).unwrap(),
            "\"load_from_delimited\""
        );
        assert_eq!(
            serde_json::from_str::<TransformType>("\"filter_rows\"").unwrap(),
            TransformType::FilterRows
        );
    }
}
