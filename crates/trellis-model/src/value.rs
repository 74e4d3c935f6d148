use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::ErrorValue;

/// A single cell value in a Trellis table.
///
/// The enum uses an explicit `{type, value}` tagged layout for stable IPC.
/// It is a *closed* union: every consumer matches exhaustively on the tag,
/// which is what lets transforms propagate error sentinels without runtime
/// type inspection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TableValue {
    /// IEEE-754 double precision number. Years and quarters are stored as
    /// numbers too (quarters as `year * 4 + quarter - 1`).
    Number(f64),
    /// Plain text, including categorical values and colors.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Calendar date (no time component).
    Date(NaiveDate),
    /// In-band error sentinel (missing data, parse failure, join miss, ...).
    Error(ErrorValue),
}

impl TableValue {
    pub fn is_error(&self) -> bool {
        matches!(self, TableValue::Error(_))
    }

    pub fn is_valid(&self) -> bool {
        !self.is_error()
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TableValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TableValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TableValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<ErrorValue> {
        match self {
            TableValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// True for values that render as nothing: errors and empty text.
    pub fn is_blank(&self) -> bool {
        match self {
            TableValue::Error(_) => true,
            TableValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Rank used to order values of different variants in sorts.
    /// Numbers sort before dates, then text, booleans, and errors last.
    fn variant_rank(&self) -> u8 {
        match self {
            TableValue::Number(_) => 0,
            TableValue::Date(_) => 1,
            TableValue::Text(_) => 2,
            TableValue::Boolean(_) => 3,
            TableValue::Error(_) => 4,
        }
    }
}

// Equality treats NaN as equal to itself (via `OrderedFloat`) so values can
// be used as grouping and deduplication keys. Error sentinels are equal iff
// they are the same kind.
impl PartialEq for TableValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableValue::Number(a), TableValue::Number(b)) => {
                OrderedFloat(*a) == OrderedFloat(*b)
            }
            (TableValue::Text(a), TableValue::Text(b)) => a == b,
            (TableValue::Boolean(a), TableValue::Boolean(b)) => a == b,
            (TableValue::Date(a), TableValue::Date(b)) => a == b,
            (TableValue::Error(a), TableValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TableValue {}

impl Hash for TableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            TableValue::Number(n) => OrderedFloat(*n).hash(state),
            TableValue::Text(s) => s.hash(state),
            TableValue::Boolean(b) => b.hash(state),
            TableValue::Date(d) => d.hash(state),
            TableValue::Error(e) => e.hash(state),
        }
    }
}

// A documented total order keeps multi-key sorts stable and deterministic:
// within a variant, natural order; across variants, the rank above.
impl Ord for TableValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TableValue::Number(a), TableValue::Number(b)) => {
                OrderedFloat(*a).cmp(&OrderedFloat(*b))
            }
            (TableValue::Text(a), TableValue::Text(b)) => a.cmp(b),
            (TableValue::Boolean(a), TableValue::Boolean(b)) => a.cmp(b),
            (TableValue::Date(a), TableValue::Date(b)) => a.cmp(b),
            (TableValue::Error(a), TableValue::Error(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl PartialOrd for TableValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableValue::Number(n) => write!(f, "{n}"),
            TableValue::Text(s) => f.write_str(s),
            TableValue::Boolean(b) => write!(f, "{b}"),
            TableValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TableValue::Error(e) => f.write_str(e.code()),
        }
    }
}

impl From<f64> for TableValue {
    fn from(value: f64) -> Self {
        TableValue::Number(value)
    }
}

impl From<i32> for TableValue {
    fn from(value: i32) -> Self {
        TableValue::Number(value as f64)
    }
}

impl From<bool> for TableValue {
    fn from(value: bool) -> Self {
        TableValue::Boolean(value)
    }
}

impl From<String> for TableValue {
    fn from(value: String) -> Self {
        TableValue::Text(value)
    }
}

impl From<&str> for TableValue {
    fn from(value: &str) -> Self {
        TableValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for TableValue {
    fn from(value: NaiveDate) -> Self {
        TableValue::Date(value)
    }
}

impl From<ErrorValue> for TableValue {
    fn from(value: ErrorValue) -> Self {
        TableValue::Error(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cross_variant_equality_is_false() {
        assert_ne!(TableValue::Number(1.0), TableValue::Text("1".into()));
        assert_ne!(
            TableValue::Error(ErrorValue::MissingValue),
            TableValue::Text(String::new())
        );
    }

    #[test]
    fn nan_is_equal_to_itself_for_keying() {
        assert_eq!(TableValue::Number(f64::NAN), TableValue::Number(f64::NAN));
    }

    #[test]
    fn ordering_puts_errors_last() {
        let mut values = vec![
            TableValue::Error(ErrorValue::MissingValue),
            TableValue::Text("b".into()),
            TableValue::Number(3.0),
            TableValue::Number(1.0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                TableValue::Number(1.0),
                TableValue::Number(3.0),
                TableValue::Text("b".into()),
                TableValue::Error(ErrorValue::MissingValue),
            ]
        );
    }

    #[test]
    fn serde_tagged_layout_round_trips() {
        let value = TableValue::Error(ErrorValue::ParseFailure);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"error","value":"parse_failure"}"#);
        let back: TableValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn display_formats_whole_numbers_without_fraction() {
        assert_eq!(TableValue::Number(2000.0).to_string(), "2000");
        assert_eq!(TableValue::Number(2.5).to_string(), "2.5");
    }
}
