//! # Biograph
//!
//! Biograph serves a historical/biographical knowledge graph as paginated JSON.
//! SPARQL endpoints answer with flat, join-exploded row sets: one row for every
//! combination of person, event, role, place and related entity. Biograph folds
//! those rows back into nested, deduplicated objects and computes the
//! aggregations the statistics endpoints need.
//!
//! ## Features
//!
//! - Typed decoding of RDF literals and flattening of SPARQL JSON results
//! - Schema-driven regrouping of flat rows into nested objects
//! - Date histograms and occupation taxonomy trees
//! - Pluggable query executors (in-process oxigraph store, remote endpoint)
//!
//! ## Example
//!
//! ```rust
//! use biograph::execution::{flattener, regroup};
//! use biograph::parsing::schema_config::SchemaRegistry;
//! use biograph::parsing::sparql_results::parse_results;
//!
//! fn example() -> biograph::Result<()> {
//!     let schemas = SchemaRegistry::from_json_str(
//!         r#"{"people": {"id": "?person$anchor", "label": "?name"}}"#,
//!     )?;
//!     let raw = parse_results(
//!         r#"{"head": {"vars": ["person", "name"]},
//!             "results": {"bindings": [
//!                 {"person": {"type": "uri", "value": "http://ex.org/p1"},
//!                  "name": {"type": "literal", "value": "Ada"}}
//!             ]}}"#,
//!     )?;
//!     let rows = flattener::flatten(raw)?;
//!     let people = regroup::regroup(&rows, schemas.get("people")?, None)?;
//!     assert_eq!(people.len(), 1);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::new_without_default)]

/// Core data structures: literals, scalars and rows
pub mod core;

/// Parsing of SPARQL results documents and schema configuration
pub mod parsing;

/// Row flattening and the regrouping engine
pub mod execution;

/// Date histograms, taxonomy trees and other statistics
pub mod stats;

/// Query executors for in-process and remote SPARQL stores
pub mod querying;

/// Registry of named SPARQL templates
pub mod registry;

/// Response caching
pub mod cache;

/// High-level API tying executors, schemas and aggregations together
pub mod api;

/// HTTP API server
pub mod http;

pub mod error {
    //! Error types and result definitions

    use thiserror::Error;

    /// Result type alias for Biograph operations
    pub type Result<T> = std::result::Result<T, Error>;

    /// Main error type for Biograph
    #[derive(Error, Debug)]
    pub enum Error {
        /// Malformed schema configuration. Fatal, never retried.
        #[error("Schema configuration error: {0}")]
        SchemaConfig(String),

        /// A literal does not match its declared datatype
        #[error("Cannot decode {value:?} as {datatype}: {reason}")]
        Decode { datatype: String, value: String, reason: String },

        /// A literal in a specific result row failed to decode
        #[error("Row {row}, column '{column}': {source}")]
        RowDecode {
            row: usize,
            column: String,
            #[source]
            source: Box<Error>,
        },

        /// A row handed to an aggregation lacks a required column
        #[error("Row {row} is missing required column '{column}'")]
        MissingColumn { row: usize, column: String },

        /// Query template or execution error
        #[error("Query error: {0}")]
        Query(String),

        /// Transport error talking to a remote endpoint
        #[error("HTTP error: {0}")]
        Http(String),

        /// Error raised by the in-process store
        #[error("Store error: {0}")]
        Store(String),

        /// Configuration error
        #[error("Configuration error: {0}")]
        Config(String),

        /// An encoded identifier could not be decoded
        #[error("Invalid identifier: {0}")]
        InvalidId(String),

        /// Caller supplied an out-of-range argument
        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        /// JSON (de)serialization error
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }

    impl From<reqwest::Error> for Error {
        fn from(err: reqwest::Error) -> Self {
            Error::Http(err.to_string())
        }
    }

    impl From<oxigraph::store::StorageError> for Error {
        fn from(err: oxigraph::store::StorageError) -> Self {
            Error::Store(err.to_string())
        }
    }

    impl From<oxigraph::sparql::QueryEvaluationError> for Error {
        fn from(err: oxigraph::sparql::QueryEvaluationError) -> Self {
            Error::Store(err.to_string())
        }
    }
}

// Re-export commonly used types
pub use error::{Error, Result};
