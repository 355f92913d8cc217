//! In-process SPARQL execution on an Oxigraph store.
//!
//! Useful for tests, demos and small deployments that ship their data as a
//! Turtle/N-Triples dump instead of running a triple store.
//!
//! # Example
//!
//! ```ignore
//! use biograph::querying::oxigraph_adapter::OxigraphExecutor;
//! use biograph::querying::QueryExecutor;
//! use oxigraph::io::RdfFormat;
//!
//! let executor = OxigraphExecutor::new()?;
//! executor.load_str(RdfFormat::Turtle, "<http://ex.org/a> <http://ex.org/knows> <http://ex.org/b> .")?;
//! let rows = executor.execute("SELECT ?s ?o WHERE { ?s <http://ex.org/knows> ?o }")?;
//! assert_eq!(rows.len(), 1);
//! ```

use crate::core::literal::XSD;
use crate::error::{Error, Result};
use crate::parsing::sparql_results::{Binding, RawRow};
use crate::querying::query_processing::QueryExecutor;
use oxigraph::io::RdfFormat;
use oxigraph::model::{Quad, Term};
use oxigraph::sparql::{QueryResults, SparqlEvaluator};
use oxigraph::store::Store;
use std::path::Path;

const XSD_STRING_SUFFIX: &str = "string";

pub struct OxigraphExecutor {
    store: Store,
}

impl OxigraphExecutor {
    /// Executor over a fresh in-memory store.
    pub fn new() -> Result<Self> {
        Ok(Self { store: Store::new()? })
    }

    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn insert(&self, quad: &Quad) -> Result<()> {
        self.store.insert(quad)?;
        Ok(())
    }

    pub fn load_str(&self, format: RdfFormat, data: &str) -> Result<()> {
        self.store
            .load_from_reader(format, data.as_bytes())
            .map_err(|e| Error::Store(e.to_string()))
    }

    /// Load an RDF file, the format picked from its extension.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .ok_or_else(|| {
                Error::Config(format!("cannot tell the RDF format of {}", path.display()))
            })?;
        let file = std::fs::File::open(path)?;
        self.store
            .load_from_reader(format, std::io::BufReader::new(file))
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), quads = self.store.len()?, "loaded RDF data");
        Ok(())
    }
}

/// Wrap an Oxigraph term in the envelope a SPARQL JSON endpoint would send.
fn term_to_binding(term: &Term) -> Binding {
    match term {
        Term::NamedNode(node) => Binding::uri(node.as_str()),
        Term::BlankNode(node) => Binding {
            kind: Some("bnode".to_string()),
            value: node.as_str().to_string(),
            datatype: None,
            lang: None,
        },
        Term::Literal(literal) => {
            let mut binding = Binding::literal(literal.value());
            if let Some(lang) = literal.language() {
                binding.lang = Some(lang.to_string());
            } else {
                let datatype = literal.datatype().as_str();
                if datatype.strip_prefix(XSD) != Some(XSD_STRING_SUFFIX) {
                    binding.datatype = Some(datatype.to_string());
                }
            }
            binding
        }
        #[allow(unreachable_patterns)]
        other => Binding::literal(other.to_string()),
    }
}

impl QueryExecutor for OxigraphExecutor {
    fn execute(&self, sparql: &str) -> Result<Vec<RawRow>> {
        let parsed = SparqlEvaluator::new()
            .parse_query(sparql)
            .map_err(|e| Error::Query(e.to_string()))?;
        let results = parsed.on_store(&self.store).execute()?;

        let mut rows = Vec::new();
        if let QueryResults::Solutions(solutions) = results {
            for solution in solutions {
                let solution = solution?;
                let mut row = RawRow::new();
                for (var, term) in solution.iter() {
                    row.push(var.as_str(), term_to_binding(term));
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "oxigraph"
    }
}
