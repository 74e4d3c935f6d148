//! Execution of declarative column-definition transforms.
//!
//! A definition may carry an expression like `duplicate gdp` or
//! `divideBy gdp population`; during materialization any pending expression
//! is evaluated against the store and its result column is injected. Error
//! inputs propagate as error outputs.

use trellis_model::{ColumnDef, ErrorValue, TableValue};

use crate::store::ColumnStore;

/// Apply every pending transform def (in def order) to the store.
pub fn apply_transforms(store: &mut ColumnStore, pending: &[&ColumnDef]) {
    for def in pending {
        let Some(expr) = def.transform_expr() else {
            continue;
        };

        let num_rows = store.num_rows();
        match expr.name.as_str() {
            "duplicate" => {
                if let Some(source) = expr.params.first().and_then(|slug| store.get(slug)) {
                    store.insert_shared(def.slug.clone(), source.clone());
                } else {
                    log::warn!(
                        "duplicate transform for '{}' references a missing column",
                        def.slug
                    );
                    insert_filler(store, &def.slug, num_rows);
                }
            }
            "multiplyBy" => {
                let source = expr.params.first().and_then(|slug| store.get(slug)).cloned();
                let factor = expr.params.get(1).and_then(|raw| raw.parse::<f64>().ok());
                match (source, factor) {
                    (Some(source), Some(factor)) => {
                        let values = source
                            .iter()
                            .map(|v| map_unary(v, |n| n * factor))
                            .collect();
                        store.insert(def.slug.clone(), values);
                    }
                    _ => {
                        log::warn!("multiplyBy transform for '{}' is malformed", def.slug);
                        insert_filler(store, &def.slug, num_rows);
                    }
                }
            }
            "divideBy" => binary_transform(store, def, &expr.params, |a, b| {
                if b == 0.0 {
                    TableValue::Error(ErrorValue::NotANumber)
                } else {
                    TableValue::Number(a / b)
                }
            }),
            "subtract" => {
                binary_transform(store, def, &expr.params, |a, b| TableValue::Number(a - b))
            }
            other => {
                log::warn!("unknown transform '{other}' for column '{}'", def.slug);
                insert_filler(store, &def.slug, num_rows);
            }
        }
    }
}

fn insert_filler(store: &mut ColumnStore, slug: &str, num_rows: usize) {
    store.insert(
        slug.to_string(),
        vec![TableValue::Error(ErrorValue::MissingValue); num_rows],
    );
}

fn map_unary(value: &TableValue, f: impl Fn(f64) -> f64) -> TableValue {
    match value {
        TableValue::Number(n) => TableValue::Number(f(*n)),
        TableValue::Error(e) => TableValue::Error(*e),
        _ => TableValue::Error(ErrorValue::NotANumber),
    }
}

fn binary_transform(
    store: &mut ColumnStore,
    def: &ColumnDef,
    params: &[String],
    f: impl Fn(f64, f64) -> TableValue,
) {
    let num_rows = store.num_rows();
    let a = params.first().and_then(|slug| store.get(slug)).cloned();
    let b = params.get(1).and_then(|slug| store.get(slug)).cloned();
    let (Some(a), Some(b)) = (a, b) else {
        log::warn!(
            "transform for '{}' references missing columns {:?}",
            def.slug,
            params
        );
        insert_filler(store, &def.slug, num_rows);
        return;
    };

    let values = a
        .iter()
        .zip(b.iter())
        .map(|(left, right)| match (left, right) {
            (TableValue::Error(e), _) => TableValue::Error(*e),
            (_, TableValue::Error(e)) => TableValue::Error(*e),
            (TableValue::Number(x), TableValue::Number(y)) => f(*x, *y),
            _ => TableValue::Error(ErrorValue::NotANumber),
        })
        .collect();
    store.insert(def.slug.clone(), values);
}
