//! Type-aware cell parsing and best-effort autodetection.
//!
//! Parsing never fails loudly: a raw value that does not convert to the
//! column's declared type becomes an [`ErrorValue`] sentinel occupying the
//! cell position. Autodetection is only used for root tables and delimited
//! ingestion, where no explicit definitions exist yet.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::{ColumnDef, ColumnType, ErrorValue, TableValue};

fn quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-?[Qq]([1-4])$").expect("static regex"))
}

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"))
}

/// Normalize a raw header name into a column slug: lowercase, with
/// non-alphanumeric runs collapsed to single underscores.
pub fn slugify(raw: &str) -> String {
    slug_re()
        .replace_all(raw.trim(), "_")
        .trim_matches('_')
        .to_ascii_lowercase()
}

/// Parse a boolean the permissive way spreadsheet importers do.
pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a number, tolerating grouping separators (`1,234.56`, `1_000`).
pub fn parse_number(v: &str) -> Option<f64> {
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(v.len());
    for ch in v.chars() {
        match ch {
            ',' | '_' | ' ' | '\u{00A0}' => continue,
            _ => out.push(ch),
        }
    }
    out.parse().ok()
}

/// Parse a calendar date. ISO `YYYY-MM-DD` is canonical; `YYYY/MM/DD` is
/// tolerated because it shows up in hand-edited files.
pub fn parse_date(v: &str) -> Option<NaiveDate> {
    let v = v.trim();
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(v, "%Y/%m/%d"))
        .ok()
}

/// Parse `2020-Q3` (or `2020Q3`) into the quarter's numeric encoding.
pub fn parse_quarter(v: &str) -> Option<f64> {
    let caps = quarter_re().captures(v.trim())?;
    let year: i64 = caps[1].parse().ok()?;
    let quarter: i64 = caps[2].parse().ok()?;
    Some((year * 4 + quarter - 1) as f64)
}

/// Parse a raw text cell against a declared column type.
///
/// Empty cells are [`ErrorValue::MissingValue`]; anything that does not
/// convert is [`ErrorValue::ParseFailure`].
pub fn parse_cell(column_type: ColumnType, raw: &str) -> TableValue {
    let raw = raw.trim();
    if raw.is_empty() {
        return TableValue::Error(ErrorValue::MissingValue);
    }
    match column_type {
        ColumnType::Numeric => parse_number(raw)
            .map(TableValue::Number)
            .unwrap_or(TableValue::Error(ErrorValue::ParseFailure)),
        ColumnType::Integer | ColumnType::Year => parse_number(raw)
            .filter(|n| n.fract() == 0.0)
            .map(TableValue::Number)
            .unwrap_or(TableValue::Error(ErrorValue::ParseFailure)),
        ColumnType::Quarter => parse_quarter(raw)
            .map(TableValue::Number)
            .unwrap_or(TableValue::Error(ErrorValue::ParseFailure)),
        ColumnType::Date => parse_date(raw)
            .map(TableValue::Date)
            .unwrap_or(TableValue::Error(ErrorValue::ParseFailure)),
        ColumnType::Boolean => parse_bool(raw)
            .map(TableValue::Boolean)
            .unwrap_or(TableValue::Error(ErrorValue::ParseFailure)),
        ColumnType::String | ColumnType::Categorical | ColumnType::Color => {
            TableValue::Text(raw.to_string())
        }
    }
}

/// Parse an already-wrapped value against a declared column type.
///
/// Values that are already the right variant pass through unchanged; text
/// goes through [`parse_cell`]; error sentinels propagate.
pub fn parse_value(column_type: ColumnType, value: &TableValue) -> TableValue {
    match value {
        TableValue::Error(_) => value.clone(),
        TableValue::Text(s) => parse_cell(column_type, s),
        TableValue::Number(_) if column_type.is_numeric_like() => value.clone(),
        TableValue::Date(_) if column_type == ColumnType::Date => value.clone(),
        TableValue::Boolean(_) if column_type == ColumnType::Boolean => value.clone(),
        // A typed value landing in a text column keeps its rendering.
        _ if matches!(
            column_type,
            ColumnType::String | ColumnType::Categorical | ColumnType::Color
        ) =>
        {
            TableValue::Text(value.to_string())
        }
        _ => parse_cell(column_type, &value.to_string()),
    }
}

/// The value a declared-but-absent cell takes for this type.
pub fn missing_value(_column_type: ColumnType) -> TableValue {
    TableValue::Error(ErrorValue::MissingValue)
}

/// Whether a materialized value still looks like raw input for its declared
/// type. Drives the lazy "needs parsing" policy: error sentinels never need
/// re-parsing, and values already in the right variant are left alone.
pub fn needs_parsing(column_type: ColumnType, value: &TableValue) -> bool {
    match value {
        TableValue::Error(_) => false,
        TableValue::Number(_) => !column_type.is_numeric_like(),
        TableValue::Date(_) => column_type != ColumnType::Date,
        TableValue::Boolean(_) => column_type != ColumnType::Boolean,
        TableValue::Text(_) => !matches!(
            column_type,
            ColumnType::String | ColumnType::Categorical | ColumnType::Color
        ),
    }
}

/// Best-effort typing of one raw cell, used during delimited ingestion when
/// the column has no declared type yet.
pub fn auto_type(raw: &str) -> TableValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return TableValue::Error(ErrorValue::MissingValue);
    }
    if let Some(n) = parse_number(trimmed) {
        return TableValue::Number(n);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return TableValue::Boolean(true),
        "false" => return TableValue::Boolean(false),
        _ => {}
    }
    if let Some(d) = parse_date(trimmed) {
        return TableValue::Date(d);
    }
    TableValue::Text(trimmed.to_string())
}

/// Synthesize a definition for a column present in the data but not
/// explicitly declared. Root-only policy: derived tables must carry complete
/// defs, so this runs exactly once per derivation chain.
pub fn autodetect_def(slug: &str, sample: &[TableValue]) -> ColumnDef {
    ColumnDef::new(slug).with_type(autodetect_type(slug, sample))
}

fn autodetect_type(slug: &str, sample: &[TableValue]) -> ColumnType {
    let valid: Vec<&TableValue> = sample.iter().filter(|v| v.is_valid()).collect();

    let lowered = slug.to_ascii_lowercase();
    let all_numbers =
        !valid.is_empty() && valid.iter().all(|v| matches!(v, TableValue::Number(_)));
    if lowered == "year" && all_numbers {
        return ColumnType::Year;
    }
    if all_numbers {
        return ColumnType::Numeric;
    }
    if !valid.is_empty() && valid.iter().all(|v| matches!(v, TableValue::Date(_))) {
        return ColumnType::Date;
    }
    if !valid.is_empty() && valid.iter().all(|v| matches!(v, TableValue::Boolean(_))) {
        return ColumnType::Boolean;
    }
    if valid
        .iter()
        .all(|v| matches!(v, TableValue::Text(s) if parse_quarter(s).is_some()))
        && !valid.is_empty()
    {
        return ColumnType::Quarter;
    }
    ColumnType::String
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugify_collapses_and_lowercases() {
        assert_eq!(slugify("GDP per capita ($)"), "gdp_per_capita");
        assert_eq!(slugify("year"), "year");
    }

    #[test]
    fn numeric_parsing_tolerates_grouping() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("1_000"), Some(1000.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn cells_parse_against_declared_types() {
        assert_eq!(
            parse_cell(ColumnType::Numeric, "12.5"),
            TableValue::Number(12.5)
        );
        assert_eq!(
            parse_cell(ColumnType::Year, "2020"),
            TableValue::Number(2020.0)
        );
        assert_eq!(
            parse_cell(ColumnType::Quarter, "2020-Q3"),
            TableValue::Number(2020.0 * 4.0 + 2.0)
        );
        assert_eq!(
            parse_cell(ColumnType::Date, "2020-01-31"),
            TableValue::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap())
        );
        assert_eq!(
            parse_cell(ColumnType::Numeric, "not a number"),
            TableValue::Error(ErrorValue::ParseFailure)
        );
        assert_eq!(
            parse_cell(ColumnType::Numeric, ""),
            TableValue::Error(ErrorValue::MissingValue)
        );
    }

    #[test]
    fn needs_parsing_classifies_by_variant() {
        assert!(needs_parsing(
            ColumnType::Numeric,
            &TableValue::Text("12".into())
        ));
        assert!(!needs_parsing(ColumnType::Numeric, &TableValue::Number(12.0)));
        assert!(!needs_parsing(
            ColumnType::Numeric,
            &TableValue::Error(ErrorValue::MissingValue)
        ));
        assert!(!needs_parsing(
            ColumnType::Categorical,
            &TableValue::Text("UK".into())
        ));
    }

    #[test]
    fn autodetect_prefers_year_for_year_slugs() {
        let sample = vec![TableValue::Number(2000.0), TableValue::Number(2005.0)];
        assert_eq!(autodetect_def("year", &sample).column_type, ColumnType::Year);
        assert_eq!(
            autodetect_def("population", &sample).column_type,
            ColumnType::Numeric
        );
    }

    #[test]
    fn auto_type_guesses_value_variants() {
        assert_eq!(auto_type("3.5"), TableValue::Number(3.5));
        assert_eq!(auto_type("true"), TableValue::Boolean(true));
        assert_eq!(auto_type("UK"), TableValue::Text("UK".into()));
        assert_eq!(
            auto_type(""),
            TableValue::Error(ErrorValue::MissingValue)
        );
    }
}
