//! The canonical columnar representation: an ordered mapping from column slug
//! to a shared, length-matched value sequence.
//!
//! Columns are `Arc`-shared so projections, filter fast paths, and duplicated
//! columns reuse buffers instead of copying. Rows are always a derived view
//! (row *i* = the *i*-th value of every column), never the primary shape.

use std::sync::Arc;

use indexmap::IndexMap;
use trellis_model::{ErrorValue, TableValue};

/// One column's value buffer, shared between stores that did not modify it.
pub type ColumnValues = Arc<Vec<TableValue>>;

/// A materialized row: slug → value, in column order.
pub type Row = IndexMap<String, TableValue>;

/// Separator for composite row keys. A control character so joined keys
/// cannot collide with real cell text.
const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnStore {
    columns: IndexMap<String, ColumnValues>,
}

impl ColumnStore {
    pub fn new() -> Self {
        ColumnStore::default()
    }

    pub fn insert(&mut self, slug: impl Into<String>, values: Vec<TableValue>) {
        self.columns.insert(slug.into(), Arc::new(values));
    }

    /// Insert a column sharing an existing buffer.
    pub fn insert_shared(&mut self, slug: impl Into<String>, values: ColumnValues) {
        self.columns.insert(slug.into(), values);
    }

    pub fn get(&self, slug: &str) -> Option<&ColumnValues> {
        self.columns.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.columns.contains_key(slug)
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Row count: the length of the first column (all columns are
    /// length-matched by construction).
    pub fn num_rows(&self) -> usize {
        self.columns
            .values()
            .next()
            .map(|values| values.len())
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValues)> {
        self.columns.iter().map(|(slug, v)| (slug.as_str(), v))
    }

    pub fn row_at(&self, index: usize) -> Row {
        self.columns
            .iter()
            .map(|(slug, values)| {
                let value = values
                    .get(index)
                    .cloned()
                    .unwrap_or(TableValue::Error(ErrorValue::MissingValue));
                (slug.clone(), value)
            })
            .collect()
    }

    pub fn to_rows(&self) -> Vec<Row> {
        (0..self.num_rows()).map(|i| self.row_at(i)).collect()
    }

    /// Build a store from rows: column order is first-seen key order, cells
    /// absent from a row become missing-value sentinels.
    pub fn from_rows(rows: &[Row]) -> ColumnStore {
        let mut slugs: Vec<String> = Vec::new();
        for row in rows {
            for slug in row.keys() {
                if !slugs.iter().any(|s| s == slug) {
                    slugs.push(slug.clone());
                }
            }
        }

        let mut store = ColumnStore::new();
        for slug in slugs {
            let values = rows
                .iter()
                .map(|row| {
                    row.get(&slug)
                        .cloned()
                        .unwrap_or(TableValue::Error(ErrorValue::MissingValue))
                })
                .collect();
            store.insert(slug, values);
        }
        store
    }

    /// Projection that shares buffers for the retained columns.
    pub fn select(&self, keep: &[&str]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for slug in keep {
            if let Some(values) = self.columns.get(*slug) {
                out.insert_shared(slug.to_string(), values.clone());
            }
        }
        out
    }

    pub fn without(&self, drop: &[&str]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for (slug, values) in &self.columns {
            if !drop.contains(&slug.as_str()) {
                out.insert_shared(slug.clone(), values.clone());
            }
        }
        out
    }

    pub fn renamed(&self, rename: &[(&str, &str)]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for (slug, values) in &self.columns {
            let new_slug = rename
                .iter()
                .find(|(old, _)| old == slug)
                .map(|(_, new)| new.to_string())
                .unwrap_or_else(|| slug.clone());
            out.insert_shared(new_slug, values.clone());
        }
        out
    }

    /// Reorder columns so `first` come first (in the given order); the rest
    /// keep their relative order.
    pub fn reordered(&self, first: &[&str]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for slug in first {
            if let Some(values) = self.columns.get(*slug) {
                out.insert_shared(slug.to_string(), values.clone());
            }
        }
        for (slug, values) in &self.columns {
            if !out.contains(slug) {
                out.insert_shared(slug.clone(), values.clone());
            }
        }
        out
    }

    pub fn reversed(&self) -> ColumnStore {
        let mut out = ColumnStore::new();
        for (slug, values) in &self.columns {
            let mut reversed: Vec<TableValue> = values.as_ref().clone();
            reversed.reverse();
            out.insert(slug.clone(), reversed);
        }
        out
    }

    /// Stable multi-key ascending sort by the given slugs in priority order.
    pub fn sorted_by(&self, slugs: &[&str]) -> ColumnStore {
        let key_columns: Vec<&ColumnValues> =
            slugs.iter().filter_map(|slug| self.columns.get(*slug)).collect();

        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        order.sort_by(|&a, &b| {
            for column in &key_columns {
                let ord = column[a].cmp(&column[b]);
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });

        self.permuted(&order)
    }

    /// Apply a row permutation/selection to every column.
    pub fn permuted(&self, indices: &[usize]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for (slug, values) in &self.columns {
            let picked = indices.iter().map(|&i| values[i].clone()).collect();
            out.insert(slug.clone(), picked);
        }
        out
    }

    /// Stack stores row-wise over a fixed slug order. A store missing a
    /// column contributes missing-value filler for its rows.
    pub fn concat(stores: &[&ColumnStore], slugs: &[String]) -> ColumnStore {
        let mut out = ColumnStore::new();
        for slug in slugs {
            let mut values: Vec<TableValue> = Vec::new();
            for store in stores {
                match store.get(slug) {
                    Some(column) => values.extend(column.iter().cloned()),
                    None => values.extend(
                        std::iter::repeat(TableValue::Error(ErrorValue::MissingValue))
                            .take(store.num_rows()),
                    ),
                }
            }
            out.insert(slug.clone(), values);
        }
        out
    }

    /// Composite key for one row over the given columns. Order-sensitive.
    pub fn row_key(&self, index: usize, slugs: &[&str]) -> String {
        let mut key = String::new();
        for (i, slug) in slugs.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            if let Some(values) = self.columns.get(*slug) {
                key.push_str(&values[index].to_string());
            }
        }
        key
    }
}

impl FromIterator<(String, Vec<TableValue>)> for ColumnStore {
    fn from_iter<T: IntoIterator<Item = (String, Vec<TableValue>)>>(iter: T) -> Self {
        let mut store = ColumnStore::new();
        for (slug, values) in iter {
            store.insert(slug, values);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> ColumnStore {
        let mut s = ColumnStore::new();
        s.insert("entity", vec!["UK".into(), "USA".into(), "UK".into()]);
        s.insert(
            "year",
            vec![
                TableValue::Number(2005.0),
                TableValue::Number(2000.0),
                TableValue::Number(2000.0),
            ],
        );
        s
    }

    #[test]
    fn rows_are_derived_views() {
        let s = store();
        assert_eq!(s.num_rows(), 3);
        let row = s.row_at(1);
        assert_eq!(row["entity"], TableValue::Text("USA".into()));
        assert_eq!(row["year"], TableValue::Number(2000.0));
    }

    #[test]
    fn sort_is_stable_across_keys() {
        let sorted = store().sorted_by(&["year", "entity"]);
        let years: Vec<f64> = sorted
            .get("year")
            .unwrap()
            .iter()
            .map(|v| v.as_number().unwrap())
            .collect();
        assert_eq!(years, vec![2000.0, 2000.0, 2005.0]);
        let entities: Vec<&TableValue> = sorted.get("entity").unwrap().iter().collect();
        assert_eq!(entities[0], &TableValue::Text("UK".into()));
        assert_eq!(entities[1], &TableValue::Text("USA".into()));
    }

    #[test]
    fn concat_fills_missing_columns() {
        let a = store();
        let mut b = ColumnStore::new();
        b.insert("entity", vec!["FRA".into()]);

        let slugs = vec!["entity".to_string(), "year".to_string()];
        let combined = ColumnStore::concat(&[&a, &b], &slugs);
        assert_eq!(combined.num_rows(), 4);
        assert_eq!(
            combined.get("year").unwrap()[3],
            TableValue::Error(ErrorValue::MissingValue)
        );
    }

    #[test]
    fn select_shares_buffers() {
        let s = store();
        let projected = s.select(&["entity"]);
        assert!(Arc::ptr_eq(
            s.get("entity").unwrap(),
            projected.get("entity").unwrap()
        ));
        assert_eq!(projected.num_columns(), 1);
    }

    #[test]
    fn row_keys_are_order_sensitive() {
        let s = store();
        assert_ne!(
            s.row_key(0, &["entity", "year"]),
            s.row_key(0, &["year", "entity"])
        );
        assert_eq!(s.row_key(1, &["entity"]), "USA");
    }
}
