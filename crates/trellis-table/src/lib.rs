//! An immutable, lazily-evaluated columnar table engine.
//!
//! Tables are constructed from delimited text, matrices, row records, or
//! pre-built column stores, and every transform returns a new table linked to
//! its parent. Column buffers are `Arc`-shared wherever a transform does not
//! touch the values, so long derivation chains stay cheap. Cell-level
//! problems (unparseable input, join misses, division by zero) become in-band
//! error sentinels rather than failures; aggregates skip them by
//! construction.
//!
//! ```
//! use trellis_table::Table;
//!
//! let table = Table::from_delimited("entity,year,gdp\nUK,2000,100\nUSA,2000,200", vec![]);
//! let uk = table.where_(&[("entity", "UK".into())]);
//! assert_eq!(uk.num_rows(), 1);
//! assert_eq!(table.num_rows(), 2);
//! ```

pub mod column;
pub mod input;
pub mod mask;
pub mod printers;
pub mod provenance;
pub mod store;
pub mod table;
pub mod transforms;

pub use column::Column;
pub use input::{InputKind, TableInput};
pub use mask::FilterMask;
pub use printers::AlignedTextOptions;
pub use provenance::{TableTrace, TransformType};
pub use store::{ColumnStore, ColumnValues, Row};
pub use table::{Reduction, RowIter, Table, TableError};
