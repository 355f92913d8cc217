//! Result Processing Module
//!
//! Turns raw SPARQL result sets into the nested objects served by the API.
//!
//! # Components
//!
//! - **flattener** - Strips binding envelopes and decodes typed literals
//! - **regroup** - Folds flat, join-exploded rows back into nested objects
//!
//! # Architecture
//!
//! ```text
//! QueryExecutor -> Vec<RawRow> -> flatten -> Vec<Row> -> regroup -> Vec<GroupedObject>
//! ```
//!
//! Both stages are pure functions of their inputs; the only shared state is
//! the immutable schema configuration.
//!
//! # Example
//!
//! ```ignore
//! use biograph::execution::{flattener, regroup};
//!
//! let rows = flattener::flatten(raw_rows)?;
//! let people = regroup::regroup(&rows, schemas.get("search_entities")?, None)?;
//! ```

pub mod flattener;
pub mod regroup;

// Re-export main types for convenience
pub use flattener::flatten;
pub use regroup::{regroup, GroupedObject, Value};
