//! Declarative data access
//!
//! Entities are described once as [`TableDescriptor`] constants. Reads and
//! writes are expressed as [`Filter`]s and [`FetchRequest`]s and rendered into
//! escaped SQL by [`sql`], then run by [`QueryEngine`] over any
//! [`crate::storage::Executor`].

pub mod engine;
pub mod escape;
pub mod row;
pub mod sql;
pub mod table;
pub mod timestamp;

pub use engine::QueryEngine;
pub use escape::{
    expr_begins_with, expr_contains, expr_ends_with, expr_equals, like_guts, safe_name, safe_str,
    safe_timestamp, safe_value, text_search_filter, timestamp_text,
};
pub use row::{DbSet, EMPTY_GUID, Guid, PagedRowset, Row, TableSelector, from_row, to_row};
pub use sql::{FetchRequest, Filter};
pub use table::{Column, ColumnExpr, ColumnLookup, Populate, SortOrder, TableDescriptor, lookup_col};
