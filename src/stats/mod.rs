//! Aggregations behind the statistics endpoints.
//!
//! - [`histogram`]: equal-width date histograms for birth and death dates
//! - [`taxonomy`]: occupation trees rebuilt from `broader` pointers
//! - [`entity_types`]: entity counts per type

pub mod entity_types;
pub mod histogram;
pub mod taxonomy;

pub use entity_types::entity_type_counts;
pub use histogram::{bin, Bin, BoundaryMode, DatePoint};
pub use taxonomy::{build_tree, Label, OccupationCount, TaxonomyNode, TaxonomyTree};
