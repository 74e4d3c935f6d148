//! Derivation-chain introspection, diagnostics, and text output formats.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use trellis_model::TableValue;
use trellis_table::{AlignedTextOptions, Table, TransformType};

const GDP_CSV: &str = "entity,year,gdp\nUK,2000,100\nUK,2005,120\nUSA,2000,200\nUSA,2005,220";

#[test]
fn ancestors_run_root_first() {
    let root = Table::from_delimited(GDP_CSV, vec![]);
    let leaf = root
        .where_(&[("entity", "UK".into())])
        .select(&["entity", "gdp"]);

    let chain = leaf.ancestors();
    assert_eq!(chain.len(), 3);
    assert!(Arc::ptr_eq(&chain[0], &root));
    assert!(Arc::ptr_eq(&chain[2], &leaf));
    assert!(Arc::ptr_eq(&leaf.root_table(), &root));
}

#[test]
fn traces_record_the_transform_pipeline() {
    let root = Table::from_delimited(GDP_CSV, vec![]);
    let leaf = root.where_(&[("entity", "UK".into())]).sort_by(&["year"]);

    let traces = leaf.pipeline_traces();
    let transforms: Vec<TransformType> = traces.iter().map(|t| t.transform).collect();
    assert_eq!(
        transforms,
        vec![
            TransformType::LoadFromDelimited,
            TransformType::FilterRows,
            TransformType::SortRows,
        ]
    );
    assert_eq!(traces[1].num_rows, 2);
    assert!(traces[1].description.contains("entity=UK"));
}

#[test]
fn traces_flag_shared_stores() {
    let root = Table::from_delimited(GDP_CSV, vec![]);
    let same = root.row_filter(|_, _| true, "keep everything");
    let fewer = root.where_(&[("entity", "UK".into())]);

    assert!(same.trace().store_shared_with_parent);
    assert!(!fewer.trace().store_shared_with_parent);
    assert!(!root.trace().store_shared_with_parent);
}

#[test]
fn error_accounting_splits_valid_and_error_cells() {
    let table = Table::from_delimited("entity,gdp\nUK,100\nUSA,", vec![]);
    assert_eq!(table.num_valid_cells(), 3);
    assert_eq!(table.num_error_values(), 1);
    assert_eq!(table.num_columns_with_error_values(), 1);
}

#[test]
fn delimited_exports_cover_csv_and_tsv() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    assert_eq!(table.to_csv(), GDP_CSV);
    assert_eq!(table.to_tsv(), GDP_CSV.replace(',', "\t"));
}

#[test]
fn markdown_export_includes_the_separator_row() {
    let table = Table::from_delimited("entity,gdp\nUK,100", vec![]);
    let md = table.to_markdown_table();
    assert_eq!(md, "| entity | gdp |\n| --- | --- |\n| UK | 100 |\n");
}

#[test]
fn aligned_text_pads_columns_for_consoles() {
    let table = Table::from_delimited("entity,gdp\nUK,100", vec![]);
    let text = table.to_aligned_text_table(AlignedTextOptions::default());
    assert_eq!(text, "entity gdp\nUK     100");
}

#[test]
fn domain_spans_multiple_columns() {
    let table = Table::from_delimited(GDP_CSV, vec![]);
    let (min, max) = table.domain_for(&["gdp", "year"]);
    assert_eq!(min, Some(TableValue::Number(100.0)));
    assert_eq!(max, Some(TableValue::Number(2005.0)));
}

#[test]
fn value_index_maps_key_to_value_per_row() {
    let table = Table::from_delimited("entity,gdp\nUK,100\nUSA,200", vec![]);
    let index = table.value_index("entity", "gdp");
    assert_eq!(
        index.get(&TableValue::Text("UK".into())),
        Some(&TableValue::Number(100.0))
    );
    assert_eq!(index.len(), 2);
}
