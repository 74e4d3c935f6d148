//! Completion, grouping, reduction, transposition, and column synthesis.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use trellis_model::{ColumnDef, ColumnType, ErrorValue, TableValue};
use trellis_table::{Reduction, Table, TableError};

const SPARSE_CSV: &str =
    "entity,year,gdp\nUK,2000,100\nUK,2005,120\nUSA,2000,200\nFRA,2005,150";

#[test]
fn complete_adds_every_missing_combination() {
    let table = Table::from_delimited(SPARSE_CSV, vec![]);
    let completed = table.complete(["entity", "year"]).unwrap();

    // 3 entities x 2 years.
    assert_eq!(completed.num_rows(), 6);
    let usa_2005 = completed.where_(&[
        ("entity", "USA".into()),
        ("year", TableValue::Number(2005.0)),
    ]);
    assert_eq!(usa_2005.num_rows(), 1);
    assert_eq!(
        usa_2005.get("gdp").values_with_errors()[0],
        TableValue::Error(ErrorValue::MissingValue)
    );
}

#[test]
fn complete_is_identity_for_a_complete_table() {
    let table = Table::from_delimited(
        "entity,year\nUK,2000\nUK,2005\nUSA,2000\nUSA,2005",
        vec![],
    );
    let completed = table.complete(["entity", "year"]).unwrap();
    assert!(Arc::ptr_eq(&table, &completed));
}

#[test]
fn complete_rejects_tables_with_duplicate_keys() {
    let table = Table::from_delimited("entity,year\nUK,2000\nUK,2000", vec![]);
    assert!(matches!(
        table.complete(["entity", "year"]),
        Err(TableError::MoreRowsThanCartesianProduct {
            num_rows: 2,
            expected: 1,
        })
    ));
}

#[test]
fn groups_partition_the_rows() {
    let table = Table::from_delimited(SPARSE_CSV, vec![]);
    let groups = table.group_by("entity");
    assert_eq!(groups.len(), 3);
    let total: usize = groups.iter().map(|g| g.num_rows()).sum();
    assert_eq!(total, table.num_rows());

    // First-seen group order, each group constant in the grouping column.
    assert_eq!(
        groups[0].get("entity").unique_values(),
        vec![TableValue::Text("UK".into())]
    );
    assert!(groups.iter().all(|g| g.get("entity").is_constant()));

    let sum_of_sums: f64 = groups.iter().filter_map(|g| g.get("gdp").sum()).sum();
    assert_eq!(sum_of_sums, table.get("gdp").sum().unwrap());
}

#[test]
fn sentinels_of_the_same_kind_group_together() {
    let table = Table::from_delimited("entity,gdp\nUK,\nUSA,\nFRA,5", vec![]);
    let groups = table.group_by("gdp");
    // Two missing cells form one group; the valid value forms another.
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].num_rows(), 2);
    assert_eq!(groups[1].num_rows(), 1);
}

#[test]
fn reduce_collapses_to_a_single_row() {
    let table = Table::from_delimited(SPARSE_CSV, vec![]);
    let reduced = table.reduce(vec![
        ("gdp".to_string(), Reduction::Sum),
        ("year".to_string(), Reduction::Max),
        (
            "entity".to_string(),
            Reduction::Custom(Box::new(|column| {
                TableValue::Text(format!("{} entities", column.num_uniques()))
            })),
        ),
    ]);

    assert_eq!(reduced.num_rows(), 1);
    let row = reduced.first_row().unwrap();
    assert_eq!(row["gdp"], TableValue::Number(570.0));
    assert_eq!(row["year"], TableValue::Number(2005.0));
    assert_eq!(row["entity"], TableValue::Text("3 entities".into()));
}

#[test]
fn transpose_pivots_on_the_key_column() {
    let table = Table::from_delimited("entity,gdp\nUK,100\nUSA,200", vec![]);
    let pivoted = table.transpose("entity", ColumnType::Numeric);

    assert_eq!(pivoted.column_slugs(), vec!["entity", "UK", "USA"]);
    assert_eq!(pivoted.num_rows(), 1);
    let row = pivoted.first_row().unwrap();
    assert_eq!(row["entity"], TableValue::Text("gdp".into()));
    assert_eq!(row["UK"], TableValue::Number(100.0));
    assert_eq!(row["USA"], TableValue::Number(200.0));
}

#[test]
fn combine_columns_computes_from_a_restricted_row() {
    let table = Table::from_delimited("entity,gdp,population\nUK,100,10\nUSA,200,40", vec![]);
    let combined = table.combine_columns(
        &["gdp", "population"],
        ColumnDef::new("gdp_per_capita").with_type(ColumnType::Numeric),
        |row| {
            match (row["gdp"].as_number(), row["population"].as_number()) {
                (Some(gdp), Some(population)) if population != 0.0 => {
                    TableValue::Number(gdp / population)
                }
                _ => TableValue::Error(ErrorValue::NotANumber),
            }
        },
    );
    assert_eq!(
        combined.get("gdp_per_capita").values_with_errors().to_vec(),
        vec![TableValue::Number(10.0), TableValue::Number(5.0)]
    );
}

#[test]
fn duplicated_columns_can_override_the_def() {
    let table = Table::from_delimited("entity,gdp\nUK,100\nUSA,200", vec![]);
    let doubled = table.duplicate_column("gdp", ColumnDef::new("gdp_2").with_name("GDP again"));
    assert_eq!(doubled.get("gdp_2").display_name(), "GDP again");
    assert_eq!(doubled.get("gdp_2").column_type(), ColumnType::Numeric);
    assert_eq!(
        doubled.get("gdp_2").values_with_errors(),
        doubled.get("gdp").values_with_errors()
    );
}

#[test]
fn update_defs_rewrites_the_schema_in_place() {
    let table = Table::from_delimited("entity,gdp\nUK,100", vec![]);
    let renamed = table.update_defs(|def| {
        if def.slug == "gdp" {
            def.with_name("Gross domestic product")
        } else {
            def
        }
    });
    assert_eq!(renamed.get("gdp").display_name(), "Gross domestic product");
    assert!(renamed.store_shared_with_parent());
}

#[test]
fn sort_columns_moves_keys_to_the_front() {
    let table = Table::from_delimited("entity,year,gdp\nUK,2000,100", vec![]);
    let reordered = table.sort_columns(&["gdp"]);
    assert_eq!(reordered.column_slugs(), vec!["gdp", "entity", "year"]);
}
