//! Query execution.
//!
//! [`QueryExecutor`] is the seam between the engine and a triple store. Two
//! implementations ship with the crate:
//!
//! - [`oxigraph_adapter::OxigraphExecutor`]: in-process Oxigraph store
//! - [`http_executor::HttpSparqlExecutor`]: remote SPARQL 1.1 endpoint
//!
//! [`QueryProcessor`] combines an executor with the template registry.

pub mod http_executor;
pub mod oxigraph_adapter;
pub mod query_processing;

pub use http_executor::{EndpointConfig, HttpSparqlExecutor};
pub use oxigraph_adapter::OxigraphExecutor;
pub use query_processing::{QueryExecutor, QueryProcessor};
