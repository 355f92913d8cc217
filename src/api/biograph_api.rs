use crate::{
    api::params::Pagination,
    cache::{cache_key, NoCache, ResponseCache},
    core::{Row, Scalar},
    error::{Error, Result},
    execution::regroup::{regroup, GroupedObject},
    parsing::schema_config::SchemaRegistry,
    querying::{QueryExecutor, QueryProcessor},
    registry::{QueryParams, TemplateRegistry},
    stats::{
        entity_types::entity_type_counts,
        histogram::{bin, points_from_rows, Bin, BoundaryMode},
        taxonomy::{build_tree, entries_from_grouped, TaxonomyTree, DEFAULT_MAX_DEPTH},
    },
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, num::NonZeroU32, sync::Arc};

/// Column carrying the total number of matches in paginated queries.
pub const COUNT_COLUMN: &str = "count";

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub page: u32,
    /// Total number of matches across all pages
    pub count: u64,
    pub pages: u64,
    pub results: Vec<T>,
}

/// Tuning for the statistics operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub boundary_mode: BoundaryMode,
    pub max_taxonomy_depth: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self { boundary_mode: BoundaryMode::Inclusive, max_taxonomy_depth: DEFAULT_MAX_DEPTH }
    }
}

/// Entry point for every read operation: renders a named template, runs it
/// against the configured executor and shapes the rows for the caller.
pub struct BiographApi {
    processor: QueryProcessor,
    schemas: Arc<SchemaRegistry>,
    cache: Arc<dyn ResponseCache>,
    statistics: StatisticsConfig,
}

impl BiographApi {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        templates: Arc<TemplateRegistry>,
        schemas: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            processor: QueryProcessor::new(executor, templates),
            schemas,
            cache: Arc::new(NoCache),
            statistics: StatisticsConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn statistics(&self) -> &StatisticsConfig {
        &self.statistics
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn templates(&self) -> &TemplateRegistry {
        self.processor.templates()
    }

    /// Paginated search. `limit` and `offset` are added to `params`.
    ///
    /// The total count is read from the `count` column of the first result
    /// row and dropped from the rows unless the schema maps it; templates that
    /// do not project one get the number of objects on this page instead.
    pub fn search(
        &self,
        template: &str,
        mut params: QueryParams,
        pagination: Pagination,
    ) -> Result<Page<GroupedObject>> {
        pagination.apply(&mut params);
        let mut rows = self.processor.process_query(template, &params)?;
        let schema = self.schemas.get(template)?;

        let total = rows.first().and_then(|row| row.get(COUNT_COLUMN)).map(total_count).transpose()?;
        if !schema.referenced_columns().contains(COUNT_COLUMN) {
            for row in &mut rows {
                row.remove(COUNT_COLUMN);
            }
        }

        let results = regroup(&rows, schema, None)?;
        let count = total.unwrap_or(results.len() as u64);
        Ok(Page {
            page: pagination.page(),
            count,
            pages: pagination.pages_for(count),
            results,
        })
    }

    /// Fetch a single object. `None` when the query matched nothing.
    pub fn retrieve(&self, template: &str, params: QueryParams) -> Result<Option<GroupedObject>> {
        let rows = self.processor.process_query(template, &params)?;
        Ok(self.regroup_named(template, &rows)?.into_iter().next())
    }

    pub fn date_histogram(
        &self,
        template: &str,
        params: QueryParams,
        bins: NonZeroU32,
    ) -> Result<Vec<Bin>> {
        let rows = self.processor.process_query(template, &params)?;
        let points = points_from_rows(&rows)?;
        bin(points, bins, self.statistics.boundary_mode)
    }

    /// Occupation tree plus the entries that could not be placed in it.
    pub fn occupation_tree(&self, template: &str, params: QueryParams) -> Result<TaxonomyTree> {
        let rows = self.processor.process_query(template, &params)?;
        let grouped = self.regroup_named(template, &rows)?;
        let tree = build_tree(entries_from_grouped(&grouped)?, self.statistics.max_taxonomy_depth);
        for entry in &tree.unresolved {
            tracing::warn!(
                id = %entry.id,
                broader = entry.broader.as_deref().unwrap_or("-"),
                reason = ?entry.reason,
                "occupation left out of the taxonomy"
            );
        }
        Ok(tree)
    }

    pub fn entity_types(&self, template: &str, params: QueryParams) -> Result<BTreeMap<String, u64>> {
        let rows = self.processor.process_query(template, &params)?;
        Ok(entity_type_counts(&rows))
    }

    /// Regroup `rows` with the schema registered for `template`.
    pub fn regroup_named(&self, template: &str, rows: &[Row]) -> Result<Vec<GroupedObject>> {
        regroup(rows, self.schemas.get(template)?, None)
    }

    /// Serve `compute` through the response cache. `kind` separates operations
    /// that share a template.
    pub fn cached<T, F>(
        &self,
        kind: &str,
        template: &str,
        params: &QueryParams,
        compute: F,
    ) -> Result<serde_json::Value>
    where
        T: Serialize,
        F: FnOnce() -> Result<T>,
    {
        let key = cache_key(kind, template, params);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let value = serde_json::to_value(compute()?)?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}

fn total_count(value: &Scalar) -> Result<u64> {
    match value {
        Scalar::Integer(n) => u64::try_from(*n)
            .map_err(|_| Error::InvalidArgument(format!("negative result count {}", n))),
        Scalar::String(s) => s
            .trim()
            .parse()
            .map_err(|e| Error::InvalidArgument(format!("result count {:?}: {}", s, e))),
        other => Err(Error::InvalidArgument(format!("result count is a {}", other.kind()))),
    }
}
