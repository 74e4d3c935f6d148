//! A table-bound view over one column: parsed values, error accounting, and
//! aggregate statistics computed over valid values only.

use indexmap::IndexSet;
use trellis_model::parse;
use trellis_model::{ColumnDef, ColumnType, TableValue};

use crate::table::Table;

static EMPTY: &[TableValue] = &[];

/// A column bound to exactly one table. Requesting a slug the table does not
/// have yields a *missing* column that answers every query as empty/zero —
/// callers never have to handle an error case just to probe a slug.
pub struct Column<'a> {
    table: &'a Table,
    def: ColumnDef,
    missing: bool,
}

impl<'a> Column<'a> {
    pub(crate) fn bound(table: &'a Table, def: ColumnDef) -> Self {
        Column {
            table,
            def,
            missing: false,
        }
    }

    pub(crate) fn missing(table: &'a Table, slug: &str) -> Self {
        Column {
            table,
            def: ColumnDef::new(slug),
            missing: true,
        }
    }

    pub fn slug(&self) -> &str {
        &self.def.slug
    }

    pub fn def(&self) -> &ColumnDef {
        &self.def
    }

    pub fn column_type(&self) -> ColumnType {
        self.def.column_type
    }

    pub fn display_name(&self) -> &str {
        self.def.display_name()
    }

    /// True when the requested slug does not exist in the table.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Every cell of the column, error sentinels included.
    pub fn values_with_errors(&self) -> &'a [TableValue] {
        if self.missing {
            return EMPTY;
        }
        self.table
            .column_store()
            .get(&self.def.slug)
            .map(|values| values.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Valid values only, in row order.
    pub fn values(&self) -> impl Iterator<Item = &'a TableValue> {
        self.values_with_errors().iter().filter(|v| v.is_valid())
    }

    pub fn num_values(&self) -> usize {
        self.values().count()
    }

    pub fn num_error_values(&self) -> usize {
        self.values_with_errors()
            .iter()
            .filter(|v| v.is_error())
            .count()
    }

    /// Row indices holding valid values.
    pub fn valid_row_indices(&self) -> Vec<usize> {
        self.values_with_errors()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_valid().then_some(i))
            .collect()
    }

    /// Distinct valid values in first-seen order. Error sentinels are
    /// excluded; pass `include_errors` to count them as their own keys.
    pub fn unique_values(&self) -> Vec<TableValue> {
        self.unique_values_impl(false)
    }

    pub fn unique_values_including_errors(&self) -> Vec<TableValue> {
        self.unique_values_impl(true)
    }

    fn unique_values_impl(&self, include_errors: bool) -> Vec<TableValue> {
        let mut seen: IndexSet<TableValue> = IndexSet::new();
        for value in self.values_with_errors() {
            if include_errors || value.is_valid() {
                seen.insert(value.clone());
            }
        }
        seen.into_iter().collect()
    }

    pub fn num_uniques(&self) -> usize {
        self.unique_values().len()
    }

    pub fn is_constant(&self) -> bool {
        self.num_uniques() <= 1
    }

    /// Minimum over valid values (total order from the value model).
    pub fn min_value(&self) -> Option<TableValue> {
        self.values().min().cloned()
    }

    pub fn max_value(&self) -> Option<TableValue> {
        self.values().max().cloned()
    }

    /// Mean over valid numeric values.
    pub fn mean(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in self.values() {
            sum += value.as_number()?;
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }

    pub fn sum(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut any = false;
        for value in self.values() {
            sum += value.as_number()?;
            any = true;
        }
        any.then_some(sum)
    }

    /// Row indices where the cell equals `value` (sentinel kinds compare by
    /// kind, like everywhere else).
    pub fn indices_where(&self, value: &TableValue) -> Vec<usize> {
        self.values_with_errors()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| (v == value).then_some(i))
            .collect()
    }

    /// Parse one raw value against this column's declared type.
    pub fn parse(&self, value: &TableValue) -> TableValue {
        parse::parse_value(self.def.column_type, value)
    }

    pub fn needs_parsing(&self, value: &TableValue) -> bool {
        parse::needs_parsing(self.def.column_type, value)
    }
}
