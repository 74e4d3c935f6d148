use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TableValue;

/// Semantic type of a column. Drives parsing, autodetection, and how chart
/// layers interpret the values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Floating-point numbers.
    Numeric,
    /// Numbers that should stay integral (counts, ranks).
    Integer,
    /// Free-form text.
    #[default]
    String,
    /// Text drawn from a small set of distinct values.
    Categorical,
    Boolean,
    /// Calendar year, stored as a number.
    Year,
    /// Year quarter (`2020-Q3`), stored as `year * 4 + quarter - 1`.
    Quarter,
    /// Calendar date.
    Date,
    /// CSS-style color string.
    Color,
}

impl ColumnType {
    pub fn is_numeric_like(&self) -> bool {
        matches!(
            self,
            ColumnType::Numeric | ColumnType::Integer | ColumnType::Year | ColumnType::Quarter
        )
    }

    pub fn is_time_like(&self) -> bool {
        matches!(self, ColumnType::Year | ColumnType::Quarter | ColumnType::Date)
    }
}

impl FromStr for ColumnType {
    type Err = ();

    /// Accepts both the serde tag (`numeric`) and the capitalized spelling
    /// (`Numeric`) used in hand-written column-definition text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" | "number" => Ok(ColumnType::Numeric),
            "integer" => Ok(ColumnType::Integer),
            "string" | "text" => Ok(ColumnType::String),
            "categorical" => Ok(ColumnType::Categorical),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "year" => Ok(ColumnType::Year),
            "quarter" => Ok(ColumnType::Quarter),
            "date" | "day" => Ok(ColumnType::Date),
            "color" => Ok(ColumnType::Color),
            _ => Err(()),
        }
    }
}

/// Declarative schema for one column.
///
/// Definitions outlive any one column-store materialization: a table passes
/// its resolved defs down to every derived table. Inline `values` are a
/// construction-time convenience only; the engine strips them into a side map
/// so defs stay serializable and comparable without embedded data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDef {
    /// Unique key for the column.
    pub slug: String,
    /// Human-readable name; falls back to the slug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Declarative derivation expression, e.g. `duplicate gdp` or
    /// `divideBy gdp population`. See [`TransformExpr`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Set once the transform expression has been executed, so derived tables
    /// do not re-run it against already-derived data.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub transform_has_run: bool,
    /// Inline literal values; stripped out at table construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<TableValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Opt out of parsing entirely (trusted pre-typed input).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_parsing: bool,
}

impl ColumnDef {
    pub fn new(slug: impl Into<String>) -> Self {
        ColumnDef {
            slug: slug.into(),
            ..ColumnDef::default()
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn with_values(mut self, values: Vec<TableValue>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.slug)
    }

    /// Parsed transform expression, if any.
    pub fn transform_expr(&self) -> Option<TransformExpr> {
        self.transform.as_deref().and_then(TransformExpr::parse)
    }

    /// True if this def declares a `duplicate <source>` transform.
    pub fn duplicate_source(&self) -> Option<String> {
        let expr = self.transform_expr()?;
        if expr.name == "duplicate" {
            expr.params.first().cloned()
        } else {
            None
        }
    }

    /// Merge this def over its duplicate-source def: inherited fields come
    /// from `source`, but the duplicate keeps its own slug, transform, and any
    /// name/color it declares explicitly.
    pub fn merged_over(&self, source: &ColumnDef) -> ColumnDef {
        ColumnDef {
            slug: self.slug.clone(),
            name: self.name.clone().or_else(|| source.name.clone()),
            column_type: source.column_type,
            transform: self.transform.clone(),
            transform_has_run: self.transform_has_run,
            values: self.values.clone().or_else(|| source.values.clone()),
            color: self.color.clone().or_else(|| source.color.clone()),
            skip_parsing: source.skip_parsing,
        }
    }
}

/// A parsed column transform expression: a name plus whitespace-separated
/// parameters, e.g. `multiplyBy population 1000`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformExpr {
    pub name: String,
    pub params: Vec<String>,
}

impl TransformExpr {
    pub fn parse(expr: &str) -> Option<TransformExpr> {
        let mut tokens = expr.split_whitespace();
        let name = tokens.next()?.to_string();
        Some(TransformExpr {
            name,
            params: tokens.map(str::to_string).collect(),
        })
    }
}
