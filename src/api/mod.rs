//! High-level API: search, retrieval and statistics over named templates.

pub mod biograph_api;
pub mod ids;
pub mod params;

pub use biograph_api::{BiographApi, Page, StatisticsConfig};
pub use ids::{to_iri, toggle_url_encoding};
pub use params::{Pagination, RequestIds, SearchFilters};
