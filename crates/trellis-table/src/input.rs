//! Input classification and normalization.
//!
//! A table accepts delimited text, a matrix (first row = header), an array of
//! row records, or an already-columnar store. Everything funnels into a
//! [`ColumnStore`]; for delimited text the delimiter is auto-detected and
//! cells are auto-typed unless a declared definition forces a type.

use std::collections::HashSet;
use std::sync::Arc;

use trellis_model::parse::{auto_type, parse_number, slugify};
use trellis_model::TableValue;

use crate::store::{ColumnStore, Row};

/// The raw input a table was constructed from. Kept around so lazy
/// materialization can decide whether the input store is reusable as-is.
#[derive(Clone, Debug)]
pub enum TableInput {
    /// Delimited text with a header row; delimiter auto-detected.
    Delimited(String),
    /// Array-of-arrays with the header in the first row.
    Matrix(Vec<Vec<TableValue>>),
    /// Row records.
    Rows(Vec<Row>),
    /// A pre-built column store, shared by reference from a parent table.
    Store(Arc<ColumnStore>),
}

/// Tag describing which input shape a table was loaded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Delimited,
    Matrix,
    Rows,
    Store,
}

impl TableInput {
    pub fn kind(&self) -> InputKind {
        match self {
            TableInput::Delimited(_) => InputKind::Delimited,
            TableInput::Matrix(_) => InputKind::Matrix,
            TableInput::Rows(_) => InputKind::Rows,
            TableInput::Store(_) => InputKind::Store,
        }
    }
}

/// Pick the delimiter by counting candidates in the header line.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let candidates = [b',', b'\t', b';', b'|'];
    candidates
        .into_iter()
        .max_by_key(|&d| header.bytes().filter(|&b| b == d).count())
        .filter(|&d| header.bytes().any(|b| b == d))
        .unwrap_or(b',')
}

/// Parse delimited text into a column store.
///
/// Header names are slugified; cells are auto-typed except for slugs listed
/// in `numeric_slugs`, which are parsed strictly as numbers (autotyping would
/// otherwise leave e.g. `"3e5"`-ish oddities or keep digits as text when the
/// column mixes in annotations).
pub fn parse_delimited(text: &str, numeric_slugs: &HashSet<String>) -> ColumnStore {
    let delimiter = detect_delimiter(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let slugs: Vec<String> = match records.next() {
        Some(Ok(header)) => header.iter().map(slugify).collect(),
        _ => return ColumnStore::new(),
    };

    let mut columns: Vec<Vec<TableValue>> = vec![Vec::new(); slugs.len()];
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::warn!("skipping unreadable delimited record: {err}");
                continue;
            }
        };
        for (i, slug) in slugs.iter().enumerate() {
            let raw = record.get(i).unwrap_or("");
            let value = if numeric_slugs.contains(slug) {
                match parse_number(raw) {
                    Some(n) => TableValue::Number(n),
                    None => auto_type(raw),
                }
            } else {
                auto_type(raw)
            };
            columns[i].push(value);
        }
    }

    slugs.into_iter().zip(columns).collect()
}

/// Slugs whose first data cell is empty. Autotyping is unreliable when a
/// column leads with a blank, so these columns are always re-parsed.
pub fn empty_columns_in_first_row(text: &str) -> Vec<String> {
    let delimiter = detect_delimiter(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let (Some(Ok(header)), Some(Ok(first))) = (records.next(), records.next()) else {
        return Vec::new();
    };

    header
        .iter()
        .enumerate()
        .filter(|(i, _)| first.get(*i).map(str::trim).unwrap_or("").is_empty())
        .map(|(_, name)| slugify(name))
        .collect()
}

/// Normalize a matrix (header row + data rows) into a column store. Header
/// cells become slugs via their display text.
pub fn matrix_to_store(matrix: &[Vec<TableValue>]) -> ColumnStore {
    let Some((header, data)) = matrix.split_first() else {
        return ColumnStore::new();
    };
    let slugs: Vec<String> = header.iter().map(|v| v.to_string()).collect();

    let mut columns: Vec<Vec<TableValue>> = vec![Vec::with_capacity(data.len()); slugs.len()];
    for row in data {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(
                row.get(i)
                    .cloned()
                    .unwrap_or(TableValue::Error(trellis_model::ErrorValue::MissingValue)),
            );
        }
    }
    slugs.into_iter().zip(columns).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trellis_model::ErrorValue;

    #[test]
    fn delimiter_detection_prefers_the_most_frequent_candidate() {
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("justoneheader"), b',');
    }

    #[test]
    fn delimited_text_is_auto_typed() {
        let store = parse_delimited("entity,year\nUK,2000\nUSA,2005\n", &HashSet::new());
        assert_eq!(store.num_rows(), 2);
        assert_eq!(store.get("entity").unwrap()[0], TableValue::Text("UK".into()));
        assert_eq!(store.get("year").unwrap()[1], TableValue::Number(2005.0));
    }

    #[test]
    fn ragged_records_fill_with_missing() {
        let store = parse_delimited("a,b\n1\n2,3\n", &HashSet::new());
        assert_eq!(
            store.get("b").unwrap()[0],
            TableValue::Error(ErrorValue::MissingValue)
        );
        assert_eq!(store.get("b").unwrap()[1], TableValue::Number(3.0));
    }

    #[test]
    fn empty_leading_cells_are_reported_per_slug() {
        let empties = empty_columns_in_first_row("a,b,c\n1,,x\n2,5,y\n");
        assert_eq!(empties, vec!["b".to_string()]);
    }

    #[test]
    fn matrix_first_row_is_the_header() {
        let matrix = vec![
            vec!["entity".into(), "year".into()],
            vec!["UK".into(), TableValue::Number(2000.0)],
        ];
        let store = matrix_to_store(&matrix);
        assert_eq!(store.num_rows(), 1);
        assert_eq!(store.get("year").unwrap()[0], TableValue::Number(2000.0));
    }
}
