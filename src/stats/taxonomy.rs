//! Occupation taxonomy trees.
//!
//! Statistics queries return one row per occupation with a count and an
//! optional `broader` pointer to its parent occupation. [`build_tree`]
//! reassembles those parent pointers under a synthetic `root` node.
//!
//! Attachment runs in bounded passes: every pass places the entries whose
//! parent has already been placed. Entries that never find a parent (orphans,
//! cycles, chains deeper than the pass budget) are reported in
//! [`TaxonomyTree::unresolved`] instead of being guessed into the tree.

use crate::core::Scalar;
use crate::error::{Error, Result};
use crate::execution::regroup::{GroupedObject, Value};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const ROOT_ID: &str = "root";
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// An occupation label as delivered: one string, or several when the label
/// column was promoted to a list during regrouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    One(String),
    Many(Vec<String>),
}

impl Label {
    /// Display form: several labels are joined with `" / "`, a hierarchical
    /// `"a >> b >> c"` label keeps its last segment.
    pub fn collapse(&self) -> String {
        match self {
            Label::Many(labels) => labels.join(" / "),
            Label::One(label) => match label.rsplit_once(">>") {
                Some((_, last)) => last.trim().to_string(),
                None => label.clone(),
            },
        }
    }
}

impl From<&str> for Label {
    fn from(label: &str) -> Self {
        Label::One(label.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationCount {
    pub id: String,
    pub label: Label,
    pub count: u64,
    pub broader: Option<String>,
}

impl OccupationCount {
    pub fn new(id: impl Into<String>, label: impl Into<Label>, count: u64) -> Self {
        Self { id: id.into(), label: label.into(), count, broader: None }
    }

    pub fn with_broader(mut self, broader: impl Into<String>) -> Self {
        self.broader = Some(broader.into());
        self
    }

    /// Read an entry from a regrouped statistics object with `id`, `label`,
    /// `count` and an optional nested `broader` object (or list of objects,
    /// in which case the first one wins).
    pub fn from_grouped(index: usize, object: &GroupedObject) -> Result<Self> {
        let id = object
            .scalar("id")
            .map(ToString::to_string)
            .ok_or_else(|| Error::MissingColumn { row: index, column: "id".to_string() })?;

        let label = match object.get("label") {
            Some(Value::List(labels)) => Label::Many(labels.iter().map(ToString::to_string).collect()),
            Some(Value::Scalar(label)) => Label::One(label.to_string()),
            _ => Label::One(id.clone()),
        };

        let count = match object.get("count") {
            Some(Value::Scalar(Scalar::Integer(n))) => u64::try_from(*n).map_err(|_| {
                Error::InvalidArgument(format!("occupation {}: negative count {}", id, n))
            })?,
            Some(Value::List(counts)) => {
                return Err(Error::InvalidArgument(format!(
                    "occupation {} has {} different counts",
                    id,
                    counts.len()
                )))
            }
            Some(_) => {
                return Err(Error::InvalidArgument(format!("occupation {}: count is not an integer", id)))
            }
            None => return Err(Error::MissingColumn { row: index, column: "count".to_string() }),
        };

        let broader = object
            .get("broader")
            .and_then(|value| value.objects().into_iter().next())
            .and_then(|parent| parent.scalar("id"))
            .map(ToString::to_string);

        Ok(Self { id, label, count, broader })
    }
}

/// Read a whole regrouped statistics result.
pub fn entries_from_grouped(objects: &[GroupedObject]) -> Result<Vec<OccupationCount>> {
    objects
        .iter()
        .enumerate()
        .map(|(index, object)| OccupationCount::from_grouped(index, object))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyNode {
    pub id: String,
    pub label: String,
    pub count: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    pub fn find(&self, id: &str) -> Option<&TaxonomyNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TaxonomyNode::size).sum::<usize>()
    }

    /// Ids in depth-first order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = vec![self.id.as_str()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The `broader` id names nothing that could be placed.
    MissingParent,
    /// The pass budget ran out before the parent was placed.
    DepthExceeded,
    /// An entry with the same id is already in the tree.
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    pub id: String,
    pub broader: Option<String>,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyTree {
    pub root: TaxonomyNode,
    pub unresolved: Vec<UnresolvedEntry>,
}

struct ArenaNode {
    id: String,
    label: String,
    count: u64,
    children: Vec<usize>,
}

struct Arena {
    nodes: Vec<ArenaNode>,
    placed: HashMap<String, usize>,
}

impl Arena {
    fn new() -> Self {
        let root = ArenaNode {
            id: ROOT_ID.to_string(),
            label: ROOT_ID.to_string(),
            count: 0,
            children: Vec::new(),
        };
        Self { nodes: vec![root], placed: HashMap::new() }
    }

    fn attach(&mut self, parent: usize, entry: &OccupationCount) {
        let index = self.nodes.len();
        self.nodes.push(ArenaNode {
            id: entry.id.clone(),
            label: entry.label.collapse(),
            count: entry.count,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        self.placed.insert(entry.id.clone(), index);
    }

    fn subtree(&self, index: usize) -> TaxonomyNode {
        let node = &self.nodes[index];
        TaxonomyNode {
            id: node.id.clone(),
            label: node.label.clone(),
            count: node.count,
            children: node.children.iter().map(|&child| self.subtree(child)).collect(),
        }
    }
}

fn unresolved(entry: OccupationCount, reason: UnresolvedReason) -> UnresolvedEntry {
    UnresolvedEntry { id: entry.id, broader: entry.broader, reason }
}

/// Whether following `broader` links through the still pending entries ends
/// at a placed node. Chains that loop or end at an unknown id do not.
fn chain_reaches_tree(
    start: Option<&str>,
    pending: &HashMap<&str, Option<&str>>,
    placed: &HashMap<String, usize>,
) -> bool {
    let mut seen = HashSet::new();
    let mut current = start;
    while let Some(id) = current {
        if placed.contains_key(id) {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = match pending.get(id) {
            Some(next) => *next,
            None => return false,
        };
    }
    false
}

/// Build the occupation tree.
///
/// `max_depth` bounds the number of attachment passes; a chain of `k` broader
/// links needs at most `k` passes.
pub fn build_tree(entries: Vec<OccupationCount>, max_depth: usize) -> TaxonomyTree {
    let mut arena = Arena::new();
    let mut report = Vec::new();
    let mut pending = Vec::new();

    for entry in entries {
        if entry.broader.is_some() {
            pending.push(entry);
        } else if arena.placed.contains_key(&entry.id) {
            report.push(unresolved(entry, UnresolvedReason::DuplicateId));
        } else {
            arena.attach(0, &entry);
        }
    }

    let mut passes = 0;
    while !pending.is_empty() && passes < max_depth {
        passes += 1;
        let before = pending.len();
        let mut waiting = Vec::with_capacity(pending.len());

        for entry in pending {
            if arena.placed.contains_key(&entry.id) {
                report.push(unresolved(entry, UnresolvedReason::DuplicateId));
                continue;
            }
            let parent = entry.broader.as_deref().and_then(|b| arena.placed.get(b)).copied();
            match parent {
                Some(parent) => arena.attach(parent, &entry),
                None => waiting.push(entry),
            }
        }

        pending = waiting;
        if pending.len() == before {
            break;
        }
    }

    let reasons: Vec<UnresolvedReason> = {
        let links: HashMap<&str, Option<&str>> =
            pending.iter().map(|e| (e.id.as_str(), e.broader.as_deref())).collect();
        pending
            .iter()
            .map(|entry| {
                if chain_reaches_tree(entry.broader.as_deref(), &links, &arena.placed) {
                    UnresolvedReason::DepthExceeded
                } else {
                    UnresolvedReason::MissingParent
                }
            })
            .collect()
    };
    for (entry, reason) in pending.into_iter().zip(reasons) {
        report.push(unresolved(entry, reason));
    }

    if !report.is_empty() {
        tracing::warn!(unresolved = report.len(), passes, "taxonomy entries could not be placed");
    }

    TaxonomyTree { root: arena.subtree(0), unresolved: report }
}
