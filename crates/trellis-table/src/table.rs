//! The core table abstraction: an immutable wrapper around a column store
//! with lazy materialization and a parent-linked derivation chain.
//!
//! Every transform returns a new `Arc<Table>` whose `parent` is the table it
//! was derived from. Nothing is ever mutated in place; where no copy is
//! needed (projections, all-rows filters) the child shares the parent's
//! buffers by reference.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use thiserror::Error;
use trellis_model::parse;
use trellis_model::{ColumnDef, ColumnType, ErrorValue, TableValue};

use crate::column::Column;
use crate::input::{self, InputKind, TableInput};
use crate::mask::FilterMask;
use crate::printers::{self, AlignedTextOptions};
use crate::provenance::{TableTrace, TransformType};
use crate::store::{ColumnStore, Row};
use crate::transforms::apply_transforms;

/// Caller contract violations. Bad *data* never lands here; it becomes an
/// in-band [`ErrorValue`] instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TableError {
    #[error(
        "table has {num_rows} rows but the composite key admits only {expected} combinations"
    )]
    MoreRowsThanCartesianProduct { num_rows: usize, expected: usize },
}

/// How to collapse a column in [`Table::reduce`].
pub enum Reduction {
    Min,
    Max,
    Sum,
    Mean,
    NumUniques,
    Custom(Box<dyn Fn(&Column<'_>) -> TableValue>),
}

pub struct Table {
    input: TableInput,
    defs: IndexMap<String, ColumnDef>,
    /// Literal values stripped out of defs at construction.
    literal_values: IndexMap<String, Arc<Vec<TableValue>>>,
    parent: Option<Arc<Table>>,
    description: String,
    transform: TransformType,
    filter_mask: Option<FilterMask>,
    slug: Option<String>,
    input_store: OnceLock<Arc<ColumnStore>>,
    store: OnceLock<Arc<ColumnStore>>,
    load_time: OnceLock<Duration>,
}

// ---------------------------------------------------------------------------
// Construction & lazy materialization
// ---------------------------------------------------------------------------

impl Table {
    pub fn from_delimited(text: impl Into<String>, defs: Vec<ColumnDef>) -> Arc<Table> {
        Table::from_input(TableInput::Delimited(text.into()), defs, None)
    }

    pub fn from_matrix(matrix: Vec<Vec<TableValue>>, defs: Vec<ColumnDef>) -> Arc<Table> {
        Table::from_input(TableInput::Matrix(matrix), defs, None)
    }

    pub fn from_rows(rows: Vec<Row>, defs: Vec<ColumnDef>) -> Arc<Table> {
        Table::from_input(TableInput::Rows(rows), defs, None)
    }

    pub fn from_store(store: ColumnStore, defs: Vec<ColumnDef>) -> Arc<Table> {
        Table::from_input(TableInput::Store(Arc::new(store)), defs, None)
    }

    /// Construct with column definitions supplied as delimited text
    /// (`slug,name,type,...`), parsed recursively through the engine.
    pub fn from_delimited_with_defs(data: impl Into<String>, defs_text: &str) -> Arc<Table> {
        Table::from_delimited(data, Table::defs_from_delimited(defs_text))
    }

    pub fn from_input(
        input: TableInput,
        defs: Vec<ColumnDef>,
        slug: Option<String>,
    ) -> Arc<Table> {
        let transform = match input.kind() {
            InputKind::Delimited => TransformType::LoadFromDelimited,
            InputKind::Matrix => TransformType::LoadFromMatrix,
            InputKind::Rows => TransformType::LoadFromRowStore,
            InputKind::Store => TransformType::LoadFromColumnStore,
        };
        Table::build(input, defs, None, String::new(), transform, None, slug)
    }

    /// Parse column definitions stored as delimited text. Rows without a
    /// `slug` cell are dropped.
    pub fn defs_from_delimited(defs_text: &str) -> Vec<ColumnDef> {
        let table = Table::from_delimited(defs_text, Vec::new());
        table
            .rows()
            .into_iter()
            .filter_map(|row| {
                let slug = match row.get("slug") {
                    Some(TableValue::Text(s)) if !s.is_empty() => s.clone(),
                    _ => return None,
                };
                let mut def = ColumnDef::new(slug);
                if let Some(TableValue::Text(name)) = row.get("name") {
                    def.name = Some(name.clone());
                }
                if let Some(TableValue::Text(t)) = row.get("type") {
                    if let Ok(column_type) = t.parse::<ColumnType>() {
                        def.column_type = column_type;
                    }
                }
                if let Some(TableValue::Text(transform)) = row.get("transform") {
                    if !transform.is_empty() {
                        def.transform = Some(transform.clone());
                    }
                }
                if let Some(TableValue::Text(color)) = row.get("color") {
                    if !color.is_empty() {
                        def.color = Some(color.clone());
                    }
                }
                Some(def)
            })
            .collect()
    }

    /// The single factory every table goes through, root and derived alike.
    fn build(
        input: TableInput,
        input_defs: Vec<ColumnDef>,
        parent: Option<Arc<Table>>,
        description: String,
        transform: TransformType,
        filter_mask: Option<FilterMask>,
        slug: Option<String>,
    ) -> Arc<Table> {
        // Defs with a "duplicate" transform inherit the source column's def.
        let merged: Vec<ColumnDef> = input_defs
            .iter()
            .map(|def| match def.duplicate_source() {
                Some(source_slug) => input_defs
                    .iter()
                    .find(|d| d.slug == source_slug)
                    .map(|source| def.merged_over(source))
                    .unwrap_or_else(|| def.clone()),
                None => def.clone(),
            })
            .collect();

        // Inline literal values move into a side map so defs stay
        // serializable without embedded data.
        let mut literal_values: IndexMap<String, Arc<Vec<TableValue>>> = IndexMap::new();
        let mut defs: IndexMap<String, ColumnDef> = IndexMap::new();
        for mut def in merged {
            if let Some(values) = def.values.take() {
                literal_values.insert(def.slug.clone(), Arc::new(values));
            }
            defs.insert(def.slug.clone(), def);
        }

        let input_store_lock = OnceLock::new();

        // Root-only: autodetect defs for columns present in the data but not
        // declared. Children must arrive with complete defs so renames and
        // deletes stay cheap and unambiguous.
        if parent.is_none() {
            let numeric: HashSet<String> = defs
                .values()
                .filter(|d| d.column_type.is_numeric_like())
                .map(|d| d.slug.clone())
                .collect();
            let store = normalize_input(&input, &numeric);
            for (slug, values) in store.iter() {
                if !defs.contains_key(slug) {
                    let sample: Vec<TableValue> = values.iter().take(20).cloned().collect();
                    let def = parse::autodetect_def(slug, &sample);
                    defs.insert(def.slug.clone(), def);
                }
            }
            input_store_lock.set(store).ok();
        }

        Arc::new(Table {
            input,
            defs,
            literal_values,
            parent,
            description,
            transform,
            filter_mask,
            slug,
            input_store: input_store_lock,
            store: OnceLock::new(),
            load_time: OnceLock::new(),
        })
    }

    /// Derivation factory: children of `self` are always built here.
    fn derive(
        self: &Arc<Self>,
        input: TableInput,
        defs: Vec<ColumnDef>,
        description: String,
        transform: TransformType,
        filter_mask: Option<FilterMask>,
    ) -> Arc<Table> {
        Table::build(
            input,
            defs,
            Some(Arc::clone(self)),
            description,
            transform,
            filter_mask,
            None,
        )
    }

    fn store_input(&self) -> TableInput {
        TableInput::Store(Arc::clone(self.column_store()))
    }

    /// Normalized view of the raw input, computed once.
    fn input_store(&self) -> &Arc<ColumnStore> {
        self.input_store.get_or_init(|| {
            let numeric: HashSet<String> = self
                .defs
                .values()
                .filter(|d| d.column_type.is_numeric_like())
                .map(|d| d.slug.clone())
                .collect();
            normalize_input(&self.input, &numeric)
        })
    }

    /// Columns whose values still look like raw input for their type.
    fn cols_to_parse(&self) -> Vec<String> {
        let input_store = self.input_store();
        if input_store.num_rows() == 0 {
            return Vec::new();
        }
        let candidates = self.defs.values().filter(|d| !d.skip_parsing);

        match &self.input {
            TableInput::Delimited(text) => {
                // Autotyping is unreliable when a column leads with a blank.
                let empties: HashSet<String> =
                    input::empty_columns_in_first_row(text).into_iter().collect();
                candidates
                    .filter(|def| {
                        match input_store.get(&def.slug).and_then(|v| v.first()) {
                            Some(first) => {
                                parse::needs_parsing(def.column_type, first)
                                    || empties.contains(&def.slug)
                            }
                            None => false,
                        }
                    })
                    .map(|def| def.slug.clone())
                    .collect()
            }
            // Assume external data is dirty by default: a root table parses
            // everything except columns whose values came in as literals.
            _ if self.parent.is_none() => candidates
                .filter(|def| {
                    !self.literal_values.contains_key(&def.slug)
                        && input_store.contains(&def.slug)
                })
                .map(|def| def.slug.clone())
                .collect(),
            // Derived data is usually already typed; only re-parse a column
            // whose first value still looks raw.
            _ => candidates
                .filter(|def| {
                    if self.literal_values.contains_key(&def.slug) {
                        return false;
                    }
                    match input_store.get(&def.slug).and_then(|v| v.first()) {
                        Some(first) => parse::needs_parsing(def.column_type, first),
                        None => false,
                    }
                })
                .map(|def| def.slug.clone())
                .collect(),
        }
    }

    fn pending_transform_defs(&self) -> Vec<&ColumnDef> {
        self.defs
            .values()
            .filter(|d| d.transform.is_some() && !d.transform_has_run)
            .collect()
    }

    /// Fast-path test: the input store can be exposed unchanged (modulo the
    /// filter mask) when nothing needs parsing, injecting, or deriving.
    fn can_reuse_input_store(&self) -> bool {
        self.literal_values.is_empty()
            && self.pending_transform_defs().is_empty()
            && self
                .defs
                .keys()
                .all(|slug| self.input_store().contains(slug))
            && self.cols_to_parse().is_empty()
    }

    /// The materialized column store: one length-matched sequence per
    /// declared column. Computed on first access; idempotent.
    pub fn column_store(&self) -> &Arc<ColumnStore> {
        self.store.get_or_init(|| {
            let start = Instant::now();
            let store = self.resolve_store();
            self.load_time.set(start.elapsed()).ok();
            store
        })
    }

    fn resolve_store(&self) -> Arc<ColumnStore> {
        let input_store = self.input_store();

        if self.can_reuse_input_store() {
            return match &self.filter_mask {
                Some(mask) => mask.apply(input_store),
                None => Arc::clone(input_store),
            };
        }

        let to_parse: HashSet<String> = self.cols_to_parse().into_iter().collect();

        // Row count comes from whichever declared column actually has data,
        // so partially-declared literal columns still line up.
        let mut num_rows = 0usize;
        for def in self.defs.values() {
            if let Some(values) = self.literal_values.get(&def.slug) {
                num_rows = num_rows.max(values.len());
            } else if let Some(values) = input_store.get(&def.slug) {
                num_rows = num_rows.max(values.len());
            }
        }

        let mut out = ColumnStore::new();
        for def in self.defs.values() {
            if let Some(values) = self.literal_values.get(&def.slug) {
                if values.len() == num_rows {
                    out.insert_shared(def.slug.clone(), Arc::clone(values));
                } else {
                    let mut padded = values.as_ref().clone();
                    padded.resize(num_rows, TableValue::Error(ErrorValue::MissingValue));
                    out.insert(def.slug.clone(), padded);
                }
            } else if let Some(values) = input_store.get(&def.slug) {
                if to_parse.contains(&def.slug) {
                    out.insert(
                        def.slug.clone(),
                        values
                            .iter()
                            .map(|v| parse::parse_value(def.column_type, v))
                            .collect(),
                    );
                } else {
                    out.insert_shared(def.slug.clone(), Arc::clone(values));
                }
            } else if def.transform.is_some() && !def.transform_has_run {
                // Filled in by apply_transforms below.
            } else {
                out.insert(
                    def.slug.clone(),
                    vec![parse::missing_value(def.column_type); num_rows],
                );
            }
        }

        let pending = self.pending_transform_defs();
        if !pending.is_empty() {
            apply_transforms(&mut out, &pending);
        }

        let out = Arc::new(out);
        match &self.filter_mask {
            Some(mask) => mask.apply(&out),
            None => out,
        }
    }

    /// Resolved defs, with executed transforms marked so derived tables do
    /// not re-run them against already-derived data.
    pub fn defs(&self) -> Vec<ColumnDef> {
        self.defs
            .values()
            .map(|def| {
                let mut def = def.clone();
                if def.transform.is_some() {
                    def.transform_has_run = true;
                }
                def
            })
            .collect()
    }
}

fn normalize_input(input: &TableInput, numeric_slugs: &HashSet<String>) -> Arc<ColumnStore> {
    match input {
        TableInput::Delimited(text) => Arc::new(input::parse_delimited(text, numeric_slugs)),
        TableInput::Matrix(matrix) => Arc::new(input::matrix_to_store(matrix)),
        TableInput::Rows(rows) => Arc::new(ColumnStore::from_rows(rows)),
        TableInput::Store(store) => Arc::clone(store),
    }
}

// ---------------------------------------------------------------------------
// Queries & views
// ---------------------------------------------------------------------------

/// Restartable, single-pass iterator over a table's rows, materializing one
/// row at a time.
pub struct RowIter<'a> {
    store: &'a ColumnStore,
    index: usize,
}

impl Iterator for RowIter<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.index >= self.store.num_rows() {
            return None;
        }
        let row = self.store.row_at(self.index);
        self.index += 1;
        Some(row)
    }
}

impl Table {
    pub fn table_slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn transform_type(&self) -> TransformType {
        self.transform
    }

    pub fn parent(&self) -> Option<&Arc<Table>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn num_rows(&self) -> usize {
        self.column_store().num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.defs.len()
    }

    pub fn column_slugs(&self) -> Vec<String> {
        self.defs.keys().cloned().collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.defs
            .values()
            .map(|def| def.display_name().to_string())
            .collect()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.defs.values().map(|def| def.column_type).collect()
    }

    pub fn numeric_slugs(&self) -> Vec<String> {
        self.defs
            .values()
            .filter(|def| def.column_type.is_numeric_like())
            .map(|def| def.slug.clone())
            .collect()
    }

    pub fn has(&self, slug: &str) -> bool {
        self.defs.contains_key(slug)
    }

    /// Every slug is answerable: an unknown slug yields a missing column
    /// that reports empty values and zero counts.
    pub fn get(&self, slug: &str) -> Column<'_> {
        match self.defs.get(slug) {
            Some(def) => Column::bound(self, def.clone()),
            None => Column::missing(self, slug),
        }
    }

    pub fn get_columns(&self, slugs: &[&str]) -> Vec<Column<'_>> {
        slugs.iter().map(|slug| self.get(slug)).collect()
    }

    pub fn first_column_of_type(&self, column_type: ColumnType) -> Option<Column<'_>> {
        self.defs
            .values()
            .find(|def| def.column_type == column_type)
            .map(|def| Column::bound(self, def.clone()))
    }

    /// Slugs of columns with at most one distinct valid value.
    pub fn constant_columns(&self) -> Vec<String> {
        self.defs
            .keys()
            .filter(|slug| self.get(slug).is_constant())
            .cloned()
            .collect()
    }

    /// Combined min/max over several columns at once.
    pub fn domain_for(&self, slugs: &[&str]) -> (Option<TableValue>, Option<TableValue>) {
        let min = slugs.iter().filter_map(|s| self.get(s).min_value()).min();
        let max = slugs.iter().filter_map(|s| self.get(s).max_value()).max();
        (min, max)
    }

    pub fn rows(&self) -> Vec<Row> {
        self.column_store().to_rows()
    }

    pub fn iter_rows(&self) -> RowIter<'_> {
        RowIter {
            store: self.column_store().as_ref(),
            index: 0,
        }
    }

    pub fn row_at(&self, index: usize) -> Option<Row> {
        (index < self.num_rows()).then(|| self.column_store().row_at(index))
    }

    pub fn first_row(&self) -> Option<Row> {
        self.row_at(0)
    }

    pub fn last_row(&self) -> Option<Row> {
        self.num_rows().checked_sub(1).and_then(|i| self.row_at(i))
    }

    pub fn rows_at(&self, indices: &[usize]) -> Vec<Row> {
        let store = self.column_store();
        indices.iter().map(|&i| store.row_at(i)).collect()
    }

    pub fn rows_from(&self, start: usize, end: usize) -> Vec<Row> {
        let end = end.min(self.num_rows());
        if start >= end {
            return Vec::new();
        }
        (start..end).map(|i| self.column_store().row_at(i)).collect()
    }

    pub fn get_values_at_indices(&self, slug: &str, indices: &[usize]) -> Vec<TableValue> {
        let values = self.get(slug).values_with_errors().to_vec();
        indices
            .iter()
            .map(|&i| {
                values
                    .get(i)
                    .cloned()
                    .unwrap_or(TableValue::Error(ErrorValue::MissingValue))
            })
            .collect()
    }

    /// Composite-key index: key = the row's values over `slugs`, value = the
    /// matching row indices.
    pub fn row_index(&self, slugs: &[&str]) -> HashMap<String, Vec<usize>> {
        let store = self.column_store();
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for row in 0..store.num_rows() {
            index.entry(store.row_key(row, slugs)).or_default().push(row);
        }
        index
    }

    /// Value index: first-seen ordered map from each distinct value of the
    /// column (error sentinels keyed by kind) to its row indices.
    pub fn index_by(&self, slug: &str) -> IndexMap<TableValue, Vec<usize>> {
        let mut index: IndexMap<TableValue, Vec<usize>> = IndexMap::new();
        for (row, value) in self.get(slug).values_with_errors().iter().enumerate() {
            index.entry(value.clone()).or_default().push(row);
        }
        index
    }

    /// Map from a key column's valid values to a value column's valid values
    /// at the same row (last occurrence wins, as with any map build).
    pub fn value_index(
        &self,
        index_slug: &str,
        value_slug: &str,
    ) -> HashMap<TableValue, TableValue> {
        let keys = self.get(index_slug).values_with_errors().to_vec();
        let values = self.get(value_slug).values_with_errors().to_vec();
        keys.into_iter()
            .zip(values)
            .filter(|(k, v)| k.is_valid() && v.is_valid())
            .collect()
    }

    /// Conjunctive equality match: row indices where every queried column
    /// equals the queried value.
    pub fn find_row_indices(&self, query: &[(&str, TableValue)]) -> Vec<usize> {
        let Some(((slug, value), rest)) = query.split_first() else {
            return (0..self.num_rows()).collect();
        };
        let mut result = self.get(slug).indices_where(value);
        for (slug, value) in rest {
            let matches: HashSet<usize> =
                self.get(slug).indices_where(value).into_iter().collect();
            result.retain(|i| matches.contains(i));
        }
        result
    }

    pub fn find_rows(&self, query: &[(&str, TableValue)]) -> Vec<Row> {
        self.rows_at(&self.find_row_indices(query))
    }

    pub fn index_of(&self, row: &Row) -> Option<usize> {
        let query: Vec<(&str, TableValue)> = row
            .iter()
            .map(|(slug, value)| (slug.as_str(), value.clone()))
            .collect();
        self.find_row_indices(&query).first().copied()
    }

    pub fn is_row_empty(&self, index: usize) -> bool {
        self.column_store()
            .row_at(index)
            .values()
            .all(TableValue::is_blank)
    }

    /// Matrix with a header row; error values export as empty text.
    pub fn to_matrix(&self) -> Vec<Vec<TableValue>> {
        self.matrix_impl(false)
    }

    /// Same as [`Table::to_matrix`] but error sentinels are preserved.
    pub fn to_typed_matrix(&self) -> Vec<Vec<TableValue>> {
        self.matrix_impl(true)
    }

    fn matrix_impl(&self, keep_errors: bool) -> Vec<Vec<TableValue>> {
        let slugs = self.column_slugs();
        let mut matrix: Vec<Vec<TableValue>> = Vec::with_capacity(self.num_rows() + 1);
        matrix.push(slugs.iter().map(|s| TableValue::Text(s.clone())).collect());
        let store = self.column_store();
        for row in 0..store.num_rows() {
            matrix.push(
                slugs
                    .iter()
                    .map(|slug| {
                        let value = store.get(slug).map(|v| v[row].clone()).unwrap_or(
                            TableValue::Error(ErrorValue::MissingValue),
                        );
                        if !keep_errors && value.is_error() {
                            TableValue::Text(String::new())
                        } else {
                            value
                        }
                    })
                    .collect(),
            );
        }
        matrix
    }

    // -- error accounting ---------------------------------------------------

    pub fn num_error_values(&self) -> usize {
        self.defs
            .keys()
            .map(|slug| self.get(slug).num_error_values())
            .sum()
    }

    pub fn num_valid_cells(&self) -> usize {
        self.defs.keys().map(|slug| self.get(slug).num_values()).sum()
    }

    pub fn num_columns_with_error_values(&self) -> usize {
        self.defs
            .keys()
            .filter(|slug| self.get(slug).num_error_values() > 0)
            .count()
    }

    // -- provenance ---------------------------------------------------------

    pub fn root_table(self: &Arc<Self>) -> Arc<Table> {
        match &self.parent {
            Some(parent) => parent.root_table(),
            None => Arc::clone(self),
        }
    }

    /// The derivation chain from the root to this table, root first.
    pub fn ancestors(self: &Arc<Self>) -> Vec<Arc<Table>> {
        let mut chain = match &self.parent {
            Some(parent) => parent.ancestors(),
            None => Vec::new(),
        };
        chain.push(Arc::clone(self));
        chain
    }

    pub fn store_shared_with_parent(&self) -> bool {
        self.parent
            .as_ref()
            .is_some_and(|parent| Arc::ptr_eq(self.column_store(), parent.column_store()))
    }

    /// Diagnostic record for this table; forces materialization.
    pub fn trace(&self) -> TableTrace {
        let _ = self.column_store();
        TableTrace {
            description: self.description.clone(),
            transform: self.transform,
            num_rows: self.num_rows(),
            num_columns: self.num_columns(),
            num_valid_cells: self.num_valid_cells(),
            num_error_values: self.num_error_values(),
            load_micros: self
                .load_time
                .get()
                .map(|d| d.as_micros())
                .unwrap_or_default(),
            store_shared_with_parent: self.store_shared_with_parent(),
        }
    }

    /// Diagnostic records for the whole derivation chain, root first.
    pub fn pipeline_traces(self: &Arc<Self>) -> Vec<TableTrace> {
        self.ancestors().iter().map(|t| t.trace()).collect()
    }

    /// Log the pipeline and the first rows; debugging aid only.
    pub fn dump(self: &Arc<Self>, row_limit: usize) {
        for trace in self.pipeline_traces() {
            log::debug!("{trace:?}");
        }
        log::debug!("\n{}", self.to_aligned_text_table_with_limit(row_limit));
    }

    fn to_aligned_text_table_with_limit(&self, row_limit: usize) -> String {
        printers::to_aligned_text_table(
            &self.column_slugs(),
            &self.rows_from(0, row_limit),
            AlignedTextOptions::default(),
        )
    }

    // -- printers -----------------------------------------------------------

    pub fn to_delimited(&self, delimiter: char) -> String {
        printers::to_delimited(delimiter, &self.column_slugs(), &self.rows())
    }

    pub fn to_csv(&self) -> String {
        self.to_delimited(',')
    }

    pub fn to_tsv(&self) -> String {
        self.to_delimited('\t')
    }

    /// CSV with display names in the header instead of slugs.
    pub fn to_csv_with_column_names(&self) -> String {
        let names: Vec<String> = self.column_names();
        let slugs = self.column_slugs();
        let mut rows = Vec::new();
        for row in self.rows() {
            let mut renamed = Row::new();
            for (slug, name) in slugs.iter().zip(&names) {
                if let Some(value) = row.get(slug) {
                    renamed.insert(name.clone(), value.clone());
                }
            }
            rows.push(renamed);
        }
        printers::to_delimited(',', &names, &rows)
    }

    pub fn to_aligned_text_table(&self, options: AlignedTextOptions) -> String {
        printers::to_aligned_text_table(&self.column_slugs(), &self.rows(), options)
    }

    pub fn to_markdown_table(&self) -> String {
        printers::to_markdown_table(&self.column_slugs(), &self.rows())
    }
}

// ---------------------------------------------------------------------------
// Transform operations
// ---------------------------------------------------------------------------

impl Table {
    /// Keep rows whose values equal the query's values for every key.
    pub fn where_(self: &Arc<Self>, query: &[(&str, TableValue)]) -> Arc<Table> {
        let indices = self.find_row_indices(query);
        let described: Vec<String> = query
            .iter()
            .map(|(slug, value)| format!("{slug}={value}"))
            .collect();
        self.derive(
            self.store_input(),
            self.defs(),
            format!(
                "Selecting {} rows where {}",
                indices.len(),
                described.join("&")
            ),
            TransformType::FilterRows,
            Some(FilterMask::from_indices(self.num_rows(), &indices, true)),
        )
    }

    pub fn row_filter(
        self: &Arc<Self>,
        predicate: impl Fn(&Row, usize) -> bool,
        description: impl Into<String>,
    ) -> Arc<Table> {
        let mask: Vec<bool> = self
            .iter_rows()
            .enumerate()
            .map(|(index, row)| predicate(&row, index))
            .collect();
        self.derive(
            self.store_input(),
            self.defs(),
            description.into(),
            TransformType::FilterRows,
            Some(FilterMask::new(mask)),
        )
    }

    pub fn column_filter(
        self: &Arc<Self>,
        slug: &str,
        predicate: impl Fn(&TableValue, usize) -> bool,
        description: impl Into<String>,
    ) -> Arc<Table> {
        let mask: Vec<bool> = self
            .get(slug)
            .values_with_errors()
            .iter()
            .enumerate()
            .map(|(index, value)| predicate(value, index))
            .collect();
        self.derive(
            self.store_input(),
            self.defs(),
            description.into(),
            TransformType::FilterRows,
            Some(FilterMask::new(mask)),
        )
    }

    /// Stable multi-key ascending sort.
    pub fn sort_by(self: &Arc<Self>, slugs: &[&str]) -> Arc<Table> {
        self.derive(
            TableInput::Store(Arc::new(self.column_store().sorted_by(slugs))),
            self.defs(),
            format!("Sort by {}", slugs.join(",")),
            TransformType::SortRows,
            None,
        )
    }

    /// Move the named columns to the front, keeping the rest in order.
    pub fn sort_columns(self: &Arc<Self>, slugs: &[&str]) -> Arc<Table> {
        let mut defs: Vec<ColumnDef> = slugs
            .iter()
            .filter_map(|slug| self.defs.get(*slug).cloned())
            .collect();
        for def in self.defs() {
            if !defs.iter().any(|d| d.slug == def.slug) {
                defs.push(def);
            }
        }
        self.derive(
            TableInput::Store(Arc::new(self.column_store().reordered(slugs))),
            defs,
            "Sorted columns".to_string(),
            TransformType::SortColumns,
            None,
        )
    }

    pub fn reverse(self: &Arc<Self>) -> Arc<Table> {
        self.derive(
            TableInput::Store(Arc::new(self.column_store().reversed())),
            self.defs(),
            "Reversed row order".to_string(),
            TransformType::SortRows,
            None,
        )
    }

    /// Projection: keep only the named columns (buffers shared, not copied).
    pub fn select(self: &Arc<Self>, slugs: &[&str]) -> Arc<Table> {
        let defs: Vec<ColumnDef> = self
            .defs()
            .into_iter()
            .filter(|def| slugs.contains(&def.slug.as_str()))
            .collect();
        self.derive(
            TableInput::Store(Arc::new(self.column_store().select(slugs))),
            defs,
            format!("Kept columns '{}'", slugs.join(", ")),
            TransformType::FilterColumns,
            None,
        )
    }

    pub fn drop_columns(self: &Arc<Self>, slugs: &[&str]) -> Arc<Table> {
        self.drop_columns_described(slugs, format!("Dropped columns '{}'", slugs.join(", ")))
    }

    fn drop_columns_described(
        self: &Arc<Self>,
        slugs: &[&str],
        description: String,
    ) -> Arc<Table> {
        let defs: Vec<ColumnDef> = self
            .defs()
            .into_iter()
            .filter(|def| !slugs.contains(&def.slug.as_str()))
            .collect();
        self.derive(
            TableInput::Store(Arc::new(self.column_store().without(slugs))),
            defs,
            description,
            TransformType::FilterColumns,
            None,
        )
    }

    pub fn rename_column(self: &Arc<Self>, old: &str, new: &str) -> Arc<Table> {
        self.rename_columns(&[(old, new)])
    }

    /// Rewrite slugs in both store and defs; values unchanged.
    pub fn rename_columns(self: &Arc<Self>, rename: &[(&str, &str)]) -> Arc<Table> {
        let described: Vec<String> = rename
            .iter()
            .map(|(old, new)| format!("'{old}' to '{new}'"))
            .collect();
        let defs: Vec<ColumnDef> = self
            .defs()
            .into_iter()
            .map(|mut def| {
                if let Some((_, new)) = rename.iter().find(|(old, _)| *old == def.slug) {
                    def.slug = new.to_string();
                }
                def
            })
            .collect();
        self.derive(
            TableInput::Store(Arc::new(self.column_store().renamed(rename))),
            defs,
            format!("Renamed {}", described.join(" and ")),
            TransformType::RenameColumns,
            None,
        )
    }

    pub fn limit(self: &Arc<Self>, how_many: usize, offset: usize) -> Arc<Table> {
        let end = offset.saturating_add(how_many);
        let mask: Vec<bool> = (0..self.num_rows())
            .map(|index| index >= offset && index < end)
            .collect();
        self.derive(
            self.store_input(),
            self.defs(),
            format!("Kept {how_many} rows starting at {offset}"),
            TransformType::FilterRows,
            Some(FilterMask::new(mask)),
        )
    }

    pub fn limit_columns(self: &Arc<Self>, how_many: usize, offset: usize) -> Arc<Table> {
        let slugs = self.column_slugs();
        let keep: Vec<&str> = slugs
            .iter()
            .skip(offset)
            .take(how_many)
            .map(String::as_str)
            .collect();
        self.select(&keep)
    }

    pub fn update_defs(
        self: &Arc<Self>,
        update: impl Fn(ColumnDef) -> ColumnDef,
    ) -> Arc<Table> {
        let defs: Vec<ColumnDef> = self.defs().into_iter().map(update).collect();
        self.derive(
            self.store_input(),
            defs,
            "Updated column defs".to_string(),
            TransformType::UpdateColumnDefs,
            None,
        )
    }

    /// Union of defs across all tables (first occurrence wins), stores
    /// stacked row-wise with missing-value filler where a table lacks a
    /// column.
    pub fn concat(self: &Arc<Self>, others: &[Arc<Table>], message: &str) -> Arc<Table> {
        let mut defs = self.defs();
        for table in others {
            for def in table.defs() {
                if !defs.iter().any(|d| d.slug == def.slug) {
                    defs.push(def);
                }
            }
        }
        let slugs: Vec<String> = defs.iter().map(|def| def.slug.clone()).collect();
        let stores: Vec<Arc<ColumnStore>> = std::iter::once(self)
            .chain(others.iter())
            .map(|table| Arc::clone(table.column_store()))
            .collect();
        let borrowed: Vec<&ColumnStore> = stores.iter().map(Arc::as_ref).collect();
        self.derive(
            TableInput::Store(Arc::new(ColumnStore::concat(&borrowed, &slugs))),
            defs,
            message.to_string(),
            TransformType::Concat,
            None,
        )
    }

    pub fn append_rows(self: &Arc<Self>, rows: Vec<Row>, description: &str) -> Arc<Table> {
        let appended = self.derive(
            TableInput::Rows(rows),
            self.defs(),
            "Appended rows".to_string(),
            TransformType::LoadFromRowStore,
            None,
        );
        self.concat(&[appended], description)
    }

    pub fn append_columns(self: &Arc<Self>, new_defs: Vec<ColumnDef>) -> Arc<Table> {
        let described: Vec<String> = new_defs
            .iter()
            .map(|def| format!("'{}'", def.slug))
            .collect();
        let mut defs = self.defs();
        defs.extend(new_defs);
        self.derive(
            self.store_input(),
            defs,
            format!("Appended columns {}", described.join(" and ")),
            TransformType::AppendColumns,
            None,
        )
    }

    pub fn append_columns_if_new(self: &Arc<Self>, new_defs: Vec<ColumnDef>) -> Arc<Table> {
        self.append_columns(
            new_defs
                .into_iter()
                .filter(|def| !self.has(&def.slug))
                .collect(),
        )
    }

    /// Copy another column's values under a new def; the buffer is shared.
    pub fn duplicate_column(self: &Arc<Self>, slug: &str, overrides: ColumnDef) -> Arc<Table> {
        let mut def = overrides.merged_over(&self.get(slug).def().clone());
        def.values = self
            .column_store()
            .get(slug)
            .map(|values| values.as_ref().clone());
        let description = format!("Duplicated column '{slug}' to column '{}'", def.slug);
        let mut defs = self.defs();
        defs.push(def);
        self.derive(
            self.store_input(),
            defs,
            description,
            TransformType::AppendColumns,
            None,
        )
    }

    /// Compute a new column from several source columns via `combine`, which
    /// receives a row restricted to those columns.
    pub fn combine_columns(
        self: &Arc<Self>,
        slugs: &[&str],
        def: ColumnDef,
        combine: impl Fn(&Row) -> TableValue,
    ) -> Arc<Table> {
        if slugs.is_empty() {
            return Arc::clone(self);
        }
        let store = self.column_store();
        let values: Vec<TableValue> = (0..store.num_rows())
            .map(|row| {
                let restricted: Row = slugs
                    .iter()
                    .filter_map(|slug| {
                        store
                            .get(slug)
                            .map(|values| (slug.to_string(), values[row].clone()))
                    })
                    .collect();
                combine(&restricted)
            })
            .collect();
        let description = format!(
            "Combined columns '{}' into '{}'",
            slugs.join(", "),
            def.slug
        );
        let mut def = def;
        def.values = Some(values);
        let mut defs = self.defs();
        defs.push(def);
        self.derive(
            self.store_input(),
            defs,
            description,
            TransformType::CombineColumns,
            None,
        )
    }

    /// Replace every cell of the named columns through `replace`.
    pub fn replace_cells(
        self: &Arc<Self>,
        slugs: &[&str],
        replace: impl Fn(&TableValue) -> TableValue,
    ) -> Arc<Table> {
        let mut store = self.column_store().as_ref().clone();
        for slug in slugs {
            if let Some(values) = store.get(slug) {
                let replaced = values.iter().map(&replace).collect();
                store.insert(slug.to_string(), replaced);
            }
        }
        self.derive(
            TableInput::Store(Arc::new(store)),
            self.defs(),
            format!("Replaced all cells across columns {}", slugs.join(" and ")),
            TransformType::UpdateRows,
            None,
        )
    }

    pub fn replace_nonpositive_cells_for_log_scale(
        self: &Arc<Self>,
        slugs: &[&str],
    ) -> Arc<Table> {
        self.replace_cells(slugs, |value| match value.as_number() {
            Some(n) if n > 0.0 => value.clone(),
            _ => TableValue::Error(ErrorValue::InvalidOnLogScale),
        })
    }

    pub fn replace_negative_cells_with_error_values(
        self: &Arc<Self>,
        slugs: &[&str],
    ) -> Arc<Table> {
        self.replace_cells(slugs, |value| match value.as_number() {
            Some(n) if n >= 0.0 => value.clone(),
            _ => TableValue::Error(ErrorValue::InvalidNegative),
        })
    }

    pub fn replace_non_numeric_cells_with_error_values(
        self: &Arc<Self>,
        slugs: &[&str],
    ) -> Arc<Table> {
        self.replace_cells(slugs, |value| match value {
            TableValue::Number(_) => value.clone(),
            _ => TableValue::Error(ErrorValue::NotANumber),
        })
    }

    // -- deduplication & row dropping ---------------------------------------

    /// Indices of rows whose composite key (all columns, order-sensitive)
    /// was already seen at a lower index.
    pub fn duplicate_row_indices(&self) -> Vec<usize> {
        let store = self.column_store();
        let slugs = self.column_slugs();
        let slug_refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates = Vec::new();
        for row in 0..store.num_rows() {
            if !seen.insert(store.row_key(row, &slug_refs)) {
                duplicates.push(row);
            }
        }
        duplicates
    }

    /// Keeps the first occurrence of every distinct row.
    pub fn drop_duplicate_rows(self: &Arc<Self>) -> Arc<Table> {
        let duplicates = self.duplicate_row_indices();
        self.drop_rows_at(&duplicates, "Dropped duplicate rows")
    }

    pub fn drop_empty_rows(self: &Arc<Self>) -> Arc<Table> {
        let empties: Vec<usize> = (0..self.num_rows())
            .filter(|&index| self.is_row_empty(index))
            .collect();
        self.drop_rows_at(&empties, "Dropped empty rows")
    }

    pub fn drop_rows_at(self: &Arc<Self>, indices: &[usize], message: &str) -> Arc<Table> {
        self.derive(
            self.store_input(),
            self.defs(),
            message.to_string(),
            TransformType::FilterRows,
            Some(FilterMask::from_indices(self.num_rows(), indices, false)),
        )
    }

    /// Deterministic, seed-driven random row dropping for test data.
    /// Ordering of kept rows is preserved.
    pub fn drop_random_rows(self: &Arc<Self>, how_many: usize, seed: u64) -> Arc<Table> {
        if how_many == 0 {
            return Arc::clone(self);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let count = how_many.min(self.num_rows());
        let indices = rand::seq::index::sample(&mut rng, self.num_rows(), count).into_vec();
        self.drop_rows_at(&indices, &format!("Dropping a random {how_many} rows"))
    }

    pub fn drop_random_percent(self: &Arc<Self>, percent: f64, seed: u64) -> Arc<Table> {
        let how_many = ((percent / 100.0) * self.num_rows() as f64).floor() as usize;
        self.drop_random_rows(how_many, seed)
    }

    /// Replace a deterministic random sample of cells in each named column
    /// with the synthetic test sentinel.
    pub fn replace_random_cells(
        self: &Arc<Self>,
        how_many: usize,
        slugs: &[&str],
        seed: u64,
    ) -> Arc<Table> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = self.column_store().as_ref().clone();
        for slug in slugs {
            if let Some(values) = store.get(slug) {
                let mut replaced = values.as_ref().clone();
                let count = how_many.min(replaced.len());
                for index in rand::seq::index::sample(&mut rng, replaced.len(), count) {
                    replaced[index] = TableValue::Error(ErrorValue::DroppedForTesting);
                }
                store.insert(slug.to_string(), replaced);
            }
        }
        self.derive(
            TableInput::Store(Arc::new(store)),
            self.defs(),
            format!("Replaced a random {how_many} cells in {}", slugs.join(" and ")),
            TransformType::UpdateRows,
            None,
        )
    }

    // -- comparison filters -------------------------------------------------

    pub fn is_greater_than(
        self: &Arc<Self>,
        slug: &str,
        value: TableValue,
        description: Option<&str>,
    ) -> Arc<Table> {
        let message = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Filter where {slug} > {value}"));
        self.column_filter(slug, move |cell, _| gt_same_variant(cell, &value), message)
    }

    pub fn filter_negatives_for_log_scale(self: &Arc<Self>, slug: &str) -> Arc<Table> {
        self.is_greater_than(
            slug,
            TableValue::Number(0.0),
            Some(&format!("Remove rows if {slug} is <= 0 for log scale")),
        )
    }

    pub fn filter_negatives(self: &Arc<Self>, slug: &str) -> Arc<Table> {
        self.column_filter(
            slug,
            |value, _| matches!(value.as_number(), Some(n) if n >= 0.0),
            format!("Filter negative values for {slug}"),
        )
    }

    /// Keep rows whose joined display text matches the pattern.
    pub fn grep(self: &Arc<Self>, pattern: &Regex) -> Arc<Table> {
        let description = format!("Kept rows that matched '{pattern}'");
        self.row_filter(
            |row, _| {
                let line = row
                    .values()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                pattern.is_match(&line)
            },
            description,
        )
    }

    /// Keep columns whose slug matches the pattern.
    pub fn grep_columns(self: &Arc<Self>, pattern: &Regex) -> Arc<Table> {
        let drop: Vec<String> = self
            .column_slugs()
            .into_iter()
            .filter(|slug| !pattern.is_match(slug))
            .collect();
        let drop_refs: Vec<&str> = drop.iter().map(String::as_str).collect();
        let kept = self.num_columns() - drop.len();
        self.drop_columns_described(
            &drop_refs,
            format!("Kept {kept} columns that matched '{pattern}'"),
        )
    }

    // -- inverse views ------------------------------------------------------

    /// The rows the most recent row filter excluded. Identity for tables not
    /// produced by a masked filter.
    pub fn inverse_filter(self: &Arc<Self>) -> Arc<Table> {
        let (Some(parent), Some(mask)) = (&self.parent, &self.filter_mask) else {
            return Arc::clone(self);
        };
        self.derive(
            TableInput::Store(Arc::clone(parent.column_store())),
            self.defs(),
            "Inversing previous filter".to_string(),
            TransformType::InverseFilterRows,
            Some(mask.inverse()),
        )
    }

    /// The columns the previous projection dropped, values drawn from the
    /// parent. Identity for root tables.
    pub fn inverse_columns(self: &Arc<Self>) -> Arc<Table> {
        let Some(parent) = &self.parent else {
            return Arc::clone(self);
        };
        let defs: Vec<ColumnDef> = parent
            .defs()
            .into_iter()
            .filter(|def| !self.has(&def.slug))
            .collect();
        let slugs: Vec<&str> = defs.iter().map(|def| def.slug.as_str()).collect();
        self.derive(
            TableInput::Store(Arc::new(parent.column_store().select(&slugs))),
            defs,
            "Inversing previous column filter".to_string(),
            TransformType::InverseFilterColumns,
            None,
        )
    }

    // -- set operations -----------------------------------------------------

    pub fn column_intersection(&self, tables: &[Arc<Table>]) -> Vec<String> {
        self.column_slugs()
            .into_iter()
            .filter(|slug| tables.iter().all(|table| table.has(slug)))
            .collect()
    }

    fn shared_key_row_indices(&self, tables: &[Arc<Table>]) -> Vec<usize> {
        let shared = self.column_intersection(tables);
        if shared.is_empty() {
            return Vec::new();
        }
        let shared_refs: Vec<&str> = shared.iter().map(String::as_str).collect();
        let mut keys: Option<HashSet<String>> = None;
        for table in tables {
            let table_keys: HashSet<String> =
                table.row_index(&shared_refs).into_keys().collect();
            keys = Some(match keys {
                Some(existing) => existing.intersection(&table_keys).cloned().collect(),
                None => table_keys,
            });
        }
        let keys = keys.unwrap_or_default();
        let store = self.column_store();
        (0..store.num_rows())
            .filter(|&row| keys.contains(&store.row_key(row, &shared_refs)))
            .collect()
    }

    /// Keep only rows also present (by shared-column key) in all tables.
    pub fn intersection(self: &Arc<Self>, tables: &[Arc<Table>]) -> Arc<Table> {
        let indices = self.shared_key_row_indices(tables);
        self.derive(
            self.store_input(),
            self.defs(),
            "Keeping only rows also in all tables".to_string(),
            TransformType::FilterRows,
            Some(FilterMask::from_indices(self.num_rows(), &indices, true)),
        )
    }

    /// Drop rows present (by shared-column key) in all tables.
    pub fn difference(self: &Arc<Self>, tables: &[Arc<Table>]) -> Arc<Table> {
        let indices = self.shared_key_row_indices(tables);
        self.derive(
            self.store_input(),
            self.defs(),
            "Keeping only rows not in all other tables".to_string(),
            TransformType::FilterRows,
            Some(FilterMask::from_indices(self.num_rows(), &indices, false)),
        )
    }

    // -- joins --------------------------------------------------------------

    /// Defs for every column present in `source` but absent here, with
    /// values joined by key. First match wins; a miss contributes the
    /// join-miss sentinel.
    fn join_defs(&self, source: &Table, by: Option<&[&str]>) -> Vec<ColumnDef> {
        let by: Vec<String> = match by {
            Some(slugs) => slugs.iter().map(|s| s.to_string()).collect(),
            None => self
                .column_slugs()
                .into_iter()
                .filter(|slug| source.has(slug))
                .collect(),
        };
        let by_refs: Vec<&str> = by.iter().map(String::as_str).collect();

        let mut defs: Vec<ColumnDef> = source
            .defs()
            .into_iter()
            .filter(|def| !self.has(&def.slug))
            .map(|mut def| {
                def.values = Some(Vec::with_capacity(self.num_rows()));
                def
            })
            .collect();

        let right_index = source.row_index(&by_refs);
        let source_store = source.column_store();
        let store = self.column_store();
        for row in 0..store.num_rows() {
            let matched = right_index
                .get(&store.row_key(row, &by_refs))
                .and_then(|rows| rows.first())
                .copied();
            for def in &mut defs {
                let value = match matched {
                    Some(source_row) => source_store
                        .get(&def.slug)
                        .map(|values| values[source_row].clone())
                        .unwrap_or(TableValue::Error(ErrorValue::MissingValue)),
                    None => TableValue::Error(ErrorValue::NoMatchAfterJoin),
                };
                if let Some(values) = def.values.as_mut() {
                    values.push(value);
                }
            }
        }
        defs
    }

    pub fn left_join(self: &Arc<Self>, right: &Arc<Table>, by: Option<&[&str]>) -> Arc<Table> {
        self.append_columns(self.join_defs(right, by))
    }

    pub fn right_join(self: &Arc<Self>, right: &Arc<Table>, by: Option<&[&str]>) -> Arc<Table> {
        right.left_join(self, by)
    }

    /// Left join, then drop every row that received a join-miss sentinel.
    pub fn inner_join(self: &Arc<Self>, right: &Arc<Table>, by: Option<&[&str]>) -> Arc<Table> {
        let defs = self.join_defs(right, by);
        let mut rows_to_drop: Vec<usize> = Vec::new();
        for def in &defs {
            for (index, value) in def.values.iter().flatten().enumerate() {
                if value == &TableValue::Error(ErrorValue::NoMatchAfterJoin)
                    && !rows_to_drop.contains(&index)
                {
                    rows_to_drop.push(index);
                }
            }
        }
        self.append_columns(defs)
            .drop_rows_at(&rows_to_drop, "Dropped rows without a join match")
    }

    /// Left join in both directions, concatenated, duplicates removed.
    pub fn full_join(self: &Arc<Self>, right: &Arc<Table>, by: Option<&[&str]>) -> Arc<Table> {
        self.left_join(right, by)
            .concat(&[right.left_join(self, by)], "Full join")
            .drop_duplicate_rows()
    }

    /// Concat then drop duplicate rows.
    pub fn union(self: &Arc<Self>, tables: &[Arc<Table>]) -> Arc<Table> {
        self.concat(tables, "Combined tables").drop_duplicate_rows()
    }

    // -- grouping & reshaping -----------------------------------------------

    /// Partition rows by distinct value of the column, preserving first-seen
    /// group order. Each group is a row-filtered child of this table.
    pub fn group_by(self: &Arc<Self>, slug: &str) -> Vec<Arc<Table>> {
        self.index_by(slug)
            .into_iter()
            .map(|(group, indices)| {
                self.derive(
                    self.store_input(),
                    self.defs(),
                    format!("Rows for group {group}"),
                    TransformType::FilterRows,
                    Some(FilterMask::from_indices(self.num_rows(), &indices, true)),
                )
            })
            .collect()
    }

    /// Collapse to a single row based on the last row, substituting a named
    /// statistic (or custom function) for each targeted column.
    pub fn reduce(self: &Arc<Self>, reductions: Vec<(String, Reduction)>) -> Arc<Table> {
        let mut row = self.last_row().unwrap_or_default();
        for (slug, reduction) in &reductions {
            let column = self.get(slug);
            let missing = TableValue::Error(ErrorValue::MissingValue);
            let value = match reduction {
                Reduction::Min => column.min_value().unwrap_or(missing),
                Reduction::Max => column.max_value().unwrap_or(missing),
                Reduction::Sum => column
                    .sum()
                    .map(TableValue::Number)
                    .unwrap_or(TableValue::Error(ErrorValue::NotANumber)),
                Reduction::Mean => column
                    .mean()
                    .map(TableValue::Number)
                    .unwrap_or(TableValue::Error(ErrorValue::NotANumber)),
                Reduction::NumUniques => TableValue::Number(column.num_uniques() as f64),
                Reduction::Custom(compute) => compute(&column),
            };
            row.insert(slug.clone(), value);
        }
        self.derive(
            TableInput::Rows(vec![row]),
            self.defs(),
            "Reduced table".to_string(),
            TransformType::Reduce,
            None,
        )
    }

    /// Pivot: one new column per distinct value of `by`; one new row per
    /// original non-`by` column, named by its slug.
    pub fn transpose(self: &Arc<Self>, by: &str, new_type: ColumnType) -> Arc<Table> {
        let by_values = self.get(by).unique_values();
        let mut header: Vec<TableValue> = vec![TableValue::Text(by.to_string())];
        header.extend(by_values.iter().cloned());

        let mut defs: Vec<ColumnDef> = vec![ColumnDef::new(by)];
        defs.extend(
            by_values
                .iter()
                .map(|value| ColumnDef::new(value.to_string()).with_type(new_type)),
        );

        let mut matrix: Vec<Vec<TableValue>> = vec![header];
        for def in self.defs.values() {
            if def.slug == by {
                continue;
            }
            let mut row: Vec<TableValue> = vec![TableValue::Text(def.slug.clone())];
            row.extend(self.get(&def.slug).values_with_errors().iter().cloned());
            matrix.push(row);
        }

        self.derive(
            TableInput::Matrix(matrix),
            defs,
            "Transposed".to_string(),
            TransformType::Transpose,
            None,
        )
    }

    /// Ensure a row exists for every combination of the two columns' unique
    /// values, treating them as a composite primary key.
    ///
    /// Fails hard when the table already has more rows than the Cartesian
    /// product admits, since that violates the primary-key assumption.
    pub fn complete(self: &Arc<Self>, key: [&str; 2]) -> Result<Arc<Table>, TableError> {
        let [slug1, slug2] = key;
        let uniques1 = self.get(slug1).unique_values();
        let uniques2 = self.get(slug2).unique_values();
        let expected = uniques1.len() * uniques2.len();

        if self.num_rows() >= expected {
            if self.num_rows() > expected {
                return Err(TableError::MoreRowsThanCartesianProduct {
                    num_rows: self.num_rows(),
                    expected,
                });
            }
            // Already complete.
            return Ok(Arc::clone(self));
        }

        let values1 = self.get(slug1).values_with_errors();
        let values2 = self.get(slug2).values_with_errors();
        let mut existing: HashMap<&TableValue, HashSet<&TableValue>> = HashMap::new();
        for row in 0..self.num_rows() {
            existing.entry(&values1[row]).or_default().insert(&values2[row]);
        }

        let mut append1: Vec<TableValue> = Vec::new();
        let mut append2: Vec<TableValue> = Vec::new();
        for value1 in &uniques1 {
            let present = existing.get(value1);
            for value2 in &uniques2 {
                if !present.is_some_and(|set| set.contains(value2)) {
                    append1.push(value1.clone());
                    append2.push(value2.clone());
                }
            }
        }

        let mut append_store = ColumnStore::new();
        append_store.insert(slug1.to_string(), append1);
        append_store.insert(slug2.to_string(), append2);
        let append_table = self.derive(
            TableInput::Store(Arc::new(append_store)),
            self.defs(),
            format!("Missing combos of {slug1} x {slug2}"),
            TransformType::Complete,
            None,
        );

        Ok(self.concat(
            &[append_table],
            &format!("Append missing combos of {slug1}, {slug2}"),
        ))
    }
}

/// Strictly-greater comparison that only relates values of the same variant;
/// sentinels never compare greater than data.
fn gt_same_variant(a: &TableValue, b: &TableValue) -> bool {
    match (a, b) {
        (TableValue::Number(x), TableValue::Number(y)) => x > y,
        (TableValue::Text(x), TableValue::Text(y)) => x > y,
        (TableValue::Date(x), TableValue::Date(y)) => x > y,
        (TableValue::Boolean(x), TableValue::Boolean(y)) => x > y,
        _ => false,
    }
}
