//! `trellis-model` defines the typed value model for Trellis tables.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the table engine (`trellis-table`: stores, transforms, printers)
//! - export layers and debugging tools
//! - IPC boundaries via `serde` (JSON-safe schema)
//!
//! The central idea, inherited from spreadsheet engines, is that bad data is
//! represented *in band*: a cell that failed to parse holds an
//! [`ErrorValue`] sentinel rather than raising, and aggregates are defined to
//! skip sentinels by construction.

mod def;
mod error;
pub mod parse;
mod value;

pub use def::{ColumnDef, ColumnType, TransformExpr};
pub use error::ErrorValue;
pub use value::TableValue;
