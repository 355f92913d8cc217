//! Parsing of SPARQL JSON results and of the static regrouping schema
//! configuration.

pub mod schema_config;
pub mod sparql_results;

pub use schema_config::{FieldKind, FieldSpec, SchemaRegistry};
pub use sparql_results::{parse_results, Binding, RawRow, RawValue, SparqlResults};
