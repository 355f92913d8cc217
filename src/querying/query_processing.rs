use crate::core::Row;
use crate::error::Result;
use crate::execution::flattener;
use crate::parsing::sparql_results::RawRow;
use crate::registry::{QueryParams, TemplateRegistry};
use std::sync::Arc;

/// Something that can answer a SPARQL `SELECT` with raw result rows.
///
/// Implementations are blocking; async callers run them on a blocking thread.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sparql: &str) -> Result<Vec<RawRow>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "executor"
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn execute(&self, sparql: &str) -> Result<Vec<RawRow>> {
        (**self).execute(sparql)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Renders a named template, runs it and flattens the answer.
pub struct QueryProcessor {
    executor: Arc<dyn QueryExecutor>,
    templates: Arc<TemplateRegistry>,
}

impl QueryProcessor {
    pub fn new(executor: Arc<dyn QueryExecutor>, templates: Arc<TemplateRegistry>) -> Self {
        Self { executor, templates }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Render `template` with `params` without executing it.
    pub fn render(&self, template: &str, params: &QueryParams) -> Result<String> {
        self.templates.render(template, params)
    }

    pub fn process_query(&self, template: &str, params: &QueryParams) -> Result<Vec<Row>> {
        let sparql = self.render(template, params)?;
        let raw = self.executor.execute(&sparql)?;
        tracing::debug!(
            template,
            executor = self.executor.name(),
            rows = raw.len(),
            "query executed"
        );
        flattener::flatten(raw)
    }
}
