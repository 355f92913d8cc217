//! Entity-type counts: how many entities of each type the graph holds.

use crate::core::{Row, Scalar};
use std::collections::BTreeMap;

pub const TYPE_COLUMN: &str = "entityTypeLabel";
pub const COUNT_COLUMN: &str = "count";

/// Map `entityTypeLabel -> count`. Rows missing either column, or with a
/// non-integer count, are skipped. A repeated label keeps the count of its
/// last row.
pub fn entity_type_counts(rows: &[Row]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for row in rows {
        let (Some(label), Some(count)) = (row.get(TYPE_COLUMN), row.get(COUNT_COLUMN)) else {
            continue;
        };
        let count = match count {
            Scalar::Integer(n) => u64::try_from(*n).ok(),
            Scalar::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match count {
            Some(n) => {
                if counts.insert(label.to_string(), n).is_some() {
                    tracing::debug!(label = %label, count = n, "entity type repeated, keeping the later count");
                }
            }
            None => tracing::warn!(label = %label, "skipping entity type with unusable count"),
        }
    }
    counts
}
