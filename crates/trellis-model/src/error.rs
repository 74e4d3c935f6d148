use serde::{Deserialize, Serialize};
use std::fmt;

/// In-band sentinel for a cell that holds no usable data.
///
/// Error values travel through transforms like ordinary data; no generic
/// operation silently drops them. They are excluded from numeric aggregates
/// and (by default) from unique-value sets. Two sentinels compare equal iff
/// they are the same kind, so grouping two missing cells together works, but
/// a missing cell never groups with a parse failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorValue {
    /// The cell never had data.
    MissingValue,
    /// The raw value could not be converted to the column's declared type.
    ParseFailure,
    /// Non-positive value in a context that requires a log scale.
    InvalidOnLogScale,
    /// Negative value where negatives are disallowed.
    InvalidNegative,
    /// Non-numeric value where a number was expected.
    NotANumber,
    /// Value deliberately removed to exercise missing-data handling in tests.
    DroppedForTesting,
    /// No matching row was found during a join.
    NoMatchAfterJoin,
}

impl ErrorValue {
    /// Short spreadsheet-style code used when rendering tables for humans.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorValue::MissingValue => "#MISSING",
            ErrorValue::ParseFailure => "#PARSE!",
            ErrorValue::InvalidOnLogScale => "#LOG!",
            ErrorValue::InvalidNegative => "#NEG!",
            ErrorValue::NotANumber => "#NAN!",
            ErrorValue::DroppedForTesting => "#DROPPED",
            ErrorValue::NoMatchAfterJoin => "#NOMATCH",
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_is_equal_different_kind_is_not() {
        assert_eq!(ErrorValue::MissingValue, ErrorValue::MissingValue);
        assert_ne!(ErrorValue::MissingValue, ErrorValue::ParseFailure);
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let json = serde_json::to_string(&ErrorValue::NoMatchAfterJoin).unwrap();
        assert_eq!(json, "\"no_match_after_join\"");
        let back: ErrorValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorValue::NoMatchAfterJoin);
    }
}
