//! Boolean-per-row selection used while constructing a filtered table.
//!
//! A mask is ephemeral: it exists for the duration of one transform call and
//! is never part of the derivation chain itself.

use std::sync::Arc;

use crate::store::ColumnStore;

#[derive(Clone, Debug)]
pub struct FilterMask {
    mask: Vec<bool>,
}

impl FilterMask {
    pub fn new(mask: Vec<bool>) -> Self {
        FilterMask { mask }
    }

    /// Build from row indices. With `keep = true` the listed rows survive;
    /// with `keep = false` they are dropped.
    pub fn from_indices(num_rows: usize, indices: &[usize], keep: bool) -> Self {
        let mut mask = vec![!keep; num_rows];
        for &index in indices {
            if index < num_rows {
                mask[index] = keep;
            }
        }
        FilterMask { mask }
    }

    pub fn inverse(&self) -> FilterMask {
        FilterMask {
            mask: self.mask.iter().map(|bit| !bit).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.mask.len()
    }

    pub fn num_kept(&self) -> usize {
        self.mask.iter().filter(|&&bit| bit).count()
    }

    pub fn keeps_all(&self) -> bool {
        self.mask.iter().all(|&bit| bit)
    }

    /// Apply the mask to a store, preserving column order and per-column
    /// value order. When every row is kept the *same* store is returned,
    /// un-copied, so the lazy fast path can share the parent's buffers.
    pub fn apply(&self, store: &Arc<ColumnStore>) -> Arc<ColumnStore> {
        let keep: Vec<usize> = self
            .mask
            .iter()
            .enumerate()
            .filter_map(|(i, &bit)| bit.then_some(i))
            .collect();

        if keep.len() == self.mask.len() {
            return Arc::clone(store);
        }

        Arc::new(store.permuted(&keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trellis_model::TableValue;

    fn store() -> Arc<ColumnStore> {
        let mut s = ColumnStore::new();
        s.insert(
            "x",
            vec![
                TableValue::Number(1.0),
                TableValue::Number(2.0),
                TableValue::Number(3.0),
            ],
        );
        Arc::new(s)
    }

    #[test]
    fn keeping_every_row_returns_the_identical_store() {
        let s = store();
        let mask = FilterMask::new(vec![true, true, true]);
        let filtered = mask.apply(&s);
        assert!(Arc::ptr_eq(&s, &filtered));
    }

    #[test]
    fn apply_preserves_relative_order() {
        let s = store();
        let mask = FilterMask::new(vec![true, false, true]);
        let filtered = mask.apply(&s);
        assert_eq!(
            filtered.get("x").unwrap().as_ref(),
            &vec![TableValue::Number(1.0), TableValue::Number(3.0)]
        );
    }

    #[test]
    fn inverse_is_the_logical_complement() {
        let mask = FilterMask::from_indices(3, &[1], true);
        assert_eq!(mask.num_kept(), 1);
        let inverse = mask.inverse();
        assert_eq!(inverse.num_kept(), 2);
        assert_eq!(inverse.inverse().num_kept(), mask.num_kept());
    }
}
