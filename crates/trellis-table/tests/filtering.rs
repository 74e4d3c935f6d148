//! Row and column filtering, sorting, and the buffer-sharing fast paths.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use regex::Regex;
use trellis_model::{ColumnDef, ColumnType, ErrorValue, TableValue};
use trellis_table::Table;

const GDP_CSV: &str = "entity,year,gdp\nUK,2000,100\nUK,2005,120\nUSA,2000,200\nUSA,2005,220";

#[test]
fn filtering_never_mutates_the_parent() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let store_before = Arc::clone(table.column_store());

    let uk = table.where_(&[("entity", "UK".into())]);
    assert_eq!(uk.num_rows(), 2);
    assert_eq!(table.num_rows(), 4);
    assert!(Arc::ptr_eq(&store_before, table.column_store()));
}

#[test]
fn conjunctive_queries_match_all_keys() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let one = table.where_(&[
        ("entity", "USA".into()),
        ("year", TableValue::Number(2005.0)),
    ]);
    assert_eq!(one.num_rows(), 1);
    assert_eq!(
        one.get("gdp").values_with_errors()[0],
        TableValue::Number(220.0)
    );
}

#[test]
fn keeping_every_row_shares_the_parent_store() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let same = table.row_filter(|_, _| true, "keep everything");
    assert_eq!(same.num_rows(), 4);
    assert!(same.store_shared_with_parent());
}

#[test]
fn projection_shares_column_buffers() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let projected = table.select(&["entity", "gdp"]);
    assert_eq!(projected.column_slugs(), vec!["entity", "gdp"]);
    assert!(Arc::ptr_eq(
        table.column_store().get("gdp").unwrap(),
        projected.column_store().get("gdp").unwrap()
    ));
}

#[test]
fn inverse_filter_returns_the_excluded_rows() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let uk = table.where_(&[("entity", "UK".into())]);
    let rest = uk.inverse_filter();
    assert_eq!(rest.num_rows(), 2);
    assert_eq!(
        rest.get("entity").unique_values(),
        vec![TableValue::Text("USA".into())]
    );
    // A root table has nothing to invert.
    assert_eq!(table.inverse_filter().num_rows(), 4);
}

#[test]
fn inverse_columns_returns_the_dropped_columns() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let slim = table.select(&["entity"]);
    let rest = slim.inverse_columns();
    assert_eq!(rest.column_slugs(), vec!["year", "gdp"]);
    assert_eq!(rest.num_rows(), 4);
}

#[test]
fn sort_is_stable_across_keys() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let sorted = table.sort_by(&["year", "entity"]);
    let entities: Vec<String> = sorted
        .get("entity")
        .values_with_errors()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(entities, vec!["UK", "USA", "UK", "USA"]);
}

#[test]
fn limit_takes_a_window_of_rows() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let window = table.limit(2, 1);
    assert_eq!(window.num_rows(), 2);
    assert_eq!(
        window.get("gdp").values_with_errors()[0],
        TableValue::Number(120.0)
    );
}

#[test]
fn rename_keeps_buffers_and_swaps_slugs() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let renamed = table.rename_column("gdp", "gdp_usd");
    assert!(!renamed.has("gdp"));
    assert!(Arc::ptr_eq(
        table.column_store().get("gdp").unwrap(),
        renamed.column_store().get("gdp_usd").unwrap()
    ));
}

#[test]
fn dropping_duplicates_is_idempotent() {
    let csv = "entity,gdp\nUK,100\nUK,100\nUSA,200";
    let table = Table::from_delimited(csv, vec![]);
    let deduped = table.drop_duplicate_rows();
    assert_eq!(deduped.num_rows(), 2);

    let again = deduped.drop_duplicate_rows();
    assert_eq!(again.num_rows(), 2);
    // The second pass has nothing to drop, so the store is shared.
    assert!(again.store_shared_with_parent());
}

#[test]
fn empty_rows_are_droppable() {
    let table = Table::from_delimited("entity,gdp\nUK,100\n,\nUSA,200", vec![]);
    assert_eq!(table.drop_empty_rows().num_rows(), 2);
}

#[test]
fn random_row_dropping_is_seed_deterministic() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let a = table.drop_random_rows(2, 42);
    let b = table.drop_random_rows(2, 42);
    assert_eq!(a.num_rows(), 2);
    assert_eq!(a.to_csv(), b.to_csv());
}

#[test]
fn random_cell_replacement_marks_the_synthetic_sentinel() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let poked = table.replace_random_cells(2, &["gdp"], 7);
    let dropped = poked
        .get("gdp")
        .values_with_errors()
        .iter()
        .filter(|v| **v == TableValue::Error(ErrorValue::DroppedForTesting))
        .count();
    assert_eq!(dropped, 2);
}

#[test]
fn greater_than_never_keeps_sentinels() {
    let defs = vec![ColumnDef::new("gdp").with_type(ColumnType::Numeric)];
    let table = Table::from_delimited("gdp\nbad\n100\n200", defs);
    let filtered = table.is_greater_than("gdp", TableValue::Number(150.0), None);
    assert_eq!(filtered.num_rows(), 1);
}

#[test]
fn log_scale_replacement_flags_nonpositive_cells() {
    let table = Table::from_delimited("entity,gdp\nUK,100\nUSA,-5\nFRA,0", vec![]);
    let safe = table.replace_nonpositive_cells_for_log_scale(&["gdp"]);
    assert_eq!(
        safe.get("gdp").values_with_errors()[1],
        TableValue::Error(ErrorValue::InvalidOnLogScale)
    );
    assert_eq!(
        safe.get("gdp").values_with_errors()[2],
        TableValue::Error(ErrorValue::InvalidOnLogScale)
    );
    assert_eq!(safe.get("gdp").num_values(), 1);
}

#[test]
fn grep_matches_against_row_text() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let usa = table.grep(&Regex::new("USA").unwrap());
    assert_eq!(usa.num_rows(), 2);

    let years_only = table.grep_columns(&Regex::new("^year$").unwrap());
    assert_eq!(years_only.column_slugs(), vec!["year"]);
}
