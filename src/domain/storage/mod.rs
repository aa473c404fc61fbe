//! Storage domain - persistence abstraction layer

mod entity;
pub mod query;
mod repository;

pub use entity::{key_from_sequence, merge_fields, present_field, Record, RecordKey, RecordPatch};
pub use query::{ColumnFilter, Logic, Operator, QueryParams, RecordMatcher, SortKey};
pub use repository::Store;

#[cfg(test)]
pub use repository::mock;
