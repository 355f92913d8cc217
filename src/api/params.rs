//! Request parameters shared by the search and statistics operations.

use crate::api::ids::to_iri;
use crate::core::literal::{midnight_utc, parse_date_time};
use crate::error::{Error, Result};
use crate::registry::QueryParams;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use std::num::NonZeroU32;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;
pub const DEFAULT_BINS: u32 = 10;
pub const MAX_BINS: u32 = 1000;
pub const MAX_SEARCH_LEN: usize = 200;
pub const MAX_IDS: usize = 1000;

/// Template parameter holding a space-separated IRI list.
pub const IDS_PARAM: &str = "ids";

/// Query-string keys read by [`SearchFilters`].
pub const FILTER_KEYS: [&str; 9] = [
    "gender",
    "occupation",
    "occupations_id",
    "born_after",
    "born_before",
    "died_after",
    "died_before",
    "related_entities_id",
    "event_kind_id",
];

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page == 0 {
            return Err(Error::InvalidArgument("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Add `limit` and `offset` to template parameters.
    pub fn apply(&self, params: &mut QueryParams) {
        params.insert("limit", self.limit);
        params.insert("offset", self.offset());
    }

    /// Number of pages needed for `count` results.
    pub fn pages_for(&self, count: u64) -> u64 {
        count.div_ceil(u64::from(self.limit))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

/// Turn user search text into a label pattern: unquoted text is wildcarded on
/// both sides, quoted text is matched exactly without its quotes.
pub fn search_pattern(q: &str) -> Result<String> {
    if q.chars().count() > MAX_SEARCH_LEN {
        return Err(Error::InvalidArgument(format!(
            "search text longer than {} characters",
            MAX_SEARCH_LEN
        )));
    }
    let trimmed = q.trim();
    match trimmed.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(exact) => Ok(exact.to_string()),
        None => Ok(format!("*{}*", trimmed)),
    }
}

/// Histogram bin count, defaulting to [`DEFAULT_BINS`] and capped at [`MAX_BINS`].
pub fn bins(value: Option<u32>) -> Result<NonZeroU32> {
    let value = value.unwrap_or(DEFAULT_BINS);
    if value > MAX_BINS {
        return Err(Error::InvalidArgument(format!(
            "bins must be between 1 and {}, got {}",
            MAX_BINS, value
        )));
    }
    NonZeroU32::new(value)
        .ok_or_else(|| Error::InvalidArgument("bins must be at least 1".to_string()))
}

/// Body of the bulk endpoints: `{"id": [...]}` with encoded ids or plain IRIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestIds {
    pub id: Vec<String>,
}

/// Resolve `ids` and join them for the `ids` template parameter.
pub fn id_list<S: AsRef<str>>(ids: &[S]) -> Result<String> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument("at least one id is required".to_string()));
    }
    if ids.len() > MAX_IDS {
        return Err(Error::InvalidArgument(format!(
            "at most {} ids per request, got {}",
            MAX_IDS,
            ids.len()
        )));
    }
    let iris = ids.iter().map(|id| to_iri(id.as_ref())).collect::<Result<Vec<_>>>()?;
    Ok(iris.join(" "))
}

/// Optional filters of the search operations. Templates read the ones they
/// support; every placeholder is set, empty when the filter is unused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Gender label, matched case-insensitively
    pub gender: Option<String>,
    /// Occupation label pattern, wildcarded like `q`
    pub occupation: Option<String>,
    pub occupations_id: Vec<String>,
    pub born_after: Option<DateTime<FixedOffset>>,
    pub born_before: Option<DateTime<FixedOffset>>,
    pub died_after: Option<DateTime<FixedOffset>>,
    pub died_before: Option<DateTime<FixedOffset>>,
    pub related_entities_id: Vec<String>,
    pub event_kind_id: Vec<String>,
}

impl SearchFilters {
    /// Read filters from query-string pairs. Id filters take repeated keys;
    /// blank values and unrelated keys are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "gender" => filters.gender = Some(value.to_string()),
                "occupation" => filters.occupation = Some(search_pattern(value)?),
                "occupations_id" => filters.occupations_id.push(to_iri(value)?),
                "born_after" => filters.born_after = Some(filter_date(key, value)?),
                "born_before" => filters.born_before = Some(filter_date(key, value)?),
                "died_after" => filters.died_after = Some(filter_date(key, value)?),
                "died_before" => filters.died_before = Some(filter_date(key, value)?),
                "related_entities_id" => filters.related_entities_id.push(to_iri(value)?),
                "event_kind_id" => filters.event_kind_id.push(to_iri(value)?),
                _ => {}
            }
        }
        for (key, ids) in [
            ("occupations_id", &filters.occupations_id),
            ("related_entities_id", &filters.related_entities_id),
            ("event_kind_id", &filters.event_kind_id),
        ] {
            if ids.len() > MAX_IDS {
                return Err(Error::InvalidArgument(format!("at most {} values for {}", MAX_IDS, key)));
            }
        }
        Ok(filters)
    }

    pub fn apply(&self, params: &mut QueryParams) {
        params.insert("gender", self.gender.as_deref().unwrap_or_default());
        params.insert("occupation", self.occupation.as_deref().unwrap_or_default());
        params.insert("occupations_id", self.occupations_id.join(" "));
        params.insert("related_entities_id", self.related_entities_id.join(" "));
        params.insert("event_kind_id", self.event_kind_id.join(" "));
        for (key, date) in [
            ("born_after", self.born_after),
            ("born_before", self.born_before),
            ("died_after", self.died_after),
            ("died_before", self.died_before),
        ] {
            params.insert(key, date.map(|d| d.to_rfc3339()).unwrap_or_default());
        }
    }
}

/// A date filter: a full `xsd:dateTime` or a plain `YYYY-MM-DD` day.
fn filter_date(key: &str, value: &str) -> Result<DateTime<FixedOffset>> {
    parse_date_time(value)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d").map(midnight_utc))
        .map_err(|_| Error::InvalidArgument(format!("{} is not a date: {:?}", key, value)))
}
