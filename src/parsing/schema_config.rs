//! Schema configuration: the static mapping from result columns to output fields.
//!
//! Schemas are written as JSON, one entry per query template:
//!
//! ```json
//! {
//!   "search_entities": {
//!     "id": "?person$anchor",
//!     "label": "?entityLabel",
//!     "_linkedIds": "?linkedIds$list",
//!     "gender": {"id": "?gender", "label": "?genderLabel"},
//!     "events": {
//!       "id": "?event$anchor$list",
//!       "label": "?eventLabel",
//!       "place": {"id": "?evPlace$anchor", "label": "?evPlaceLabel"}
//!     }
//!   }
//! }
//! ```
//!
//! A string value names a source column, optionally followed by flags:
//! `$anchor` marks the column whose distinct values define one object at that
//! level, `$list` forces list cardinality. `$list` on an anchor makes the
//! enclosing nested field a list of objects. A nested object without an explicit
//! `$anchor` is anchored on its `id` field.
//!
//! Everything is validated once at load time and turned into a [`FieldSpec`]
//! tree, so the regrouping engine never has to interpret configuration strings.

use crate::error::{Error, Result};
use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Shape of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    ScalarLeaf,
    ListLeaf,
    NestedObject,
    NestedList,
}

/// One node of a regrouping schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub output_name: String,
    /// Column feeding a leaf. Always `None` for nested nodes.
    pub source_column: Option<String>,
    pub is_anchor: bool,
    pub is_list: bool,
    pub children: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn scalar(output_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            output_name: output_name.into(),
            source_column: Some(column.into()),
            is_anchor: false,
            is_list: false,
            children: Vec::new(),
        }
    }

    pub fn list(output_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self { is_list: true, ..Self::scalar(output_name, column) }
    }

    pub fn anchor(output_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self { is_anchor: true, ..Self::scalar(output_name, column) }
    }

    pub fn object(output_name: impl Into<String>, children: Vec<FieldSpec>) -> Self {
        Self {
            output_name: output_name.into(),
            source_column: None,
            is_anchor: false,
            is_list: false,
            children,
        }
    }

    pub fn object_list(output_name: impl Into<String>, children: Vec<FieldSpec>) -> Self {
        Self { is_list: true, ..Self::object(output_name, children) }
    }

    /// Schema root. Its children describe the top-level objects.
    pub fn root(children: Vec<FieldSpec>) -> Self {
        Self::object_list("", children)
    }

    pub fn kind(&self) -> FieldKind {
        match (self.is_nested(), self.is_list) {
            (false, false) => FieldKind::ScalarLeaf,
            (false, true) => FieldKind::ListLeaf,
            (true, false) => FieldKind::NestedObject,
            (true, true) => FieldKind::NestedList,
        }
    }

    pub fn is_nested(&self) -> bool {
        !self.children.is_empty()
    }

    /// The single anchor among this node's immediate children.
    pub fn anchor_child(&self) -> Result<&FieldSpec> {
        let mut anchors = self.children.iter().filter(|c| c.is_anchor);
        let first = anchors.next();
        let extra = anchors.count();
        match (first, extra) {
            (Some(anchor), 0) => Ok(anchor),
            (None, _) => Err(Error::SchemaConfig(format!(
                "level '{}' has no anchor field",
                self.display_name()
            ))),
            (Some(_), n) => Err(Error::SchemaConfig(format!(
                "level '{}' has {} anchor fields, expected exactly one",
                self.display_name(),
                n + 1
            ))),
        }
    }

    /// Column holding this level's anchor values.
    pub fn anchor_column(&self) -> Result<&str> {
        let anchor = self.anchor_child()?;
        anchor.source_column.as_deref().ok_or_else(|| {
            Error::SchemaConfig(format!(
                "anchor '{}' of level '{}' has no source column",
                anchor.output_name,
                self.display_name()
            ))
        })
    }

    /// Check the structural invariants of this subtree.
    pub fn validate(&self) -> Result<()> {
        if !self.is_nested() {
            return Err(Error::SchemaConfig(format!(
                "level '{}' has no fields",
                self.display_name()
            )));
        }
        if self.source_column.is_some() {
            return Err(Error::SchemaConfig(format!(
                "nested field '{}' cannot have its own source column",
                self.display_name()
            )));
        }
        self.anchor_column()?;

        for child in &self.children {
            if child.is_nested() {
                if child.is_anchor {
                    return Err(Error::SchemaConfig(format!(
                        "nested field '{}' cannot be an anchor",
                        child.output_name
                    )));
                }
                child.validate()?;
            } else {
                match child.source_column.as_deref() {
                    Some(column) if column_pattern().is_match(column) => {}
                    Some(column) => {
                        return Err(Error::SchemaConfig(format!(
                            "field '{}' refers to invalid column name '{}'",
                            child.output_name, column
                        )))
                    }
                    None => {
                        return Err(Error::SchemaConfig(format!(
                            "field '{}' has neither a source column nor nested fields",
                            child.output_name
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Every source column referenced anywhere in this subtree.
    pub fn referenced_columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, columns: &mut BTreeSet<&'a str>) {
        if let Some(column) = self.source_column.as_deref() {
            columns.insert(column);
        }
        for child in &self.children {
            child.collect_columns(columns);
        }
    }

    fn display_name(&self) -> &str {
        if self.output_name.is_empty() {
            "<root>"
        } else {
            &self.output_name
        }
    }
}

fn column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid column regex"))
}

/// Raw configuration node, order-preserving.
#[derive(Debug, Clone)]
enum ConfigNode {
    Column(String),
    Nested(Vec<(String, ConfigNode)>),
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = ConfigNode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a column reference string or a nested schema object")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<ConfigNode, E> {
                Ok(ConfigNode::Column(v.to_string()))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<ConfigNode, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, ConfigNode>()? {
                    entries.push((key, value));
                }
                Ok(ConfigNode::Nested(entries))
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}

/// A parsed `"?column$flag$flag"` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnRef {
    column: String,
    anchor: bool,
    list: bool,
}

fn parse_column_ref(field: &str, raw: &str) -> Result<ColumnRef> {
    let mut parts = raw.split('$');
    let head = parts.next().unwrap_or_default();
    let column = head.strip_prefix('?').unwrap_or(head).to_string();
    if !column_pattern().is_match(&column) {
        return Err(Error::SchemaConfig(format!(
            "field '{}': '{}' is not a valid column reference",
            field, raw
        )));
    }

    let mut reference = ColumnRef { column, anchor: false, list: false };
    for flag in parts {
        match flag {
            "anchor" => reference.anchor = true,
            "list" => reference.list = true,
            other => {
                return Err(Error::SchemaConfig(format!(
                    "field '{}': unknown flag '${}'",
                    field, other
                )))
            }
        }
    }
    Ok(reference)
}

/// Build the children of one nested level and return them together with
/// whether the level is a list (its anchor carried `$list`).
fn build_level(name: &str, entries: &[(String, ConfigNode)]) -> Result<(Vec<FieldSpec>, bool)> {
    let mut children = Vec::with_capacity(entries.len());
    let mut explicit_anchors = 0;
    let mut level_is_list = false;

    for (field, node) in entries {
        match node {
            ConfigNode::Column(raw) => {
                let reference = parse_column_ref(field, raw)?;
                if reference.anchor {
                    explicit_anchors += 1;
                    level_is_list |= reference.list;
                    children.push(FieldSpec::anchor(field.clone(), reference.column));
                } else if reference.list {
                    children.push(FieldSpec::list(field.clone(), reference.column));
                } else {
                    children.push(FieldSpec::scalar(field.clone(), reference.column));
                }
            }
            ConfigNode::Nested(nested) => {
                let (grandchildren, is_list) = build_level(field, nested)?;
                let spec = if is_list {
                    FieldSpec::object_list(field.clone(), grandchildren)
                } else {
                    FieldSpec::object(field.clone(), grandchildren)
                };
                children.push(spec);
            }
        }
    }

    if explicit_anchors > 1 {
        return Err(Error::SchemaConfig(format!(
            "level '{}' declares {} $anchor fields, expected exactly one",
            name, explicit_anchors
        )));
    }
    if explicit_anchors == 0 {
        match children.iter_mut().find(|c| c.output_name == "id" && !c.is_nested()) {
            Some(id_field) => {
                id_field.is_anchor = true;
                level_is_list |= id_field.is_list;
                id_field.is_list = false;
            }
            None => {
                return Err(Error::SchemaConfig(format!(
                    "level '{}' has no $anchor field and no 'id' field to anchor on",
                    name
                )))
            }
        }
    }

    Ok((children, level_is_list))
}

fn build_schema(template: &str, node: &ConfigNode) -> Result<FieldSpec> {
    let ConfigNode::Nested(entries) = node else {
        return Err(Error::SchemaConfig(format!(
            "schema '{}' must be an object of fields",
            template
        )));
    };
    let (children, is_list) = build_level(template, entries)?;
    if is_list {
        return Err(Error::SchemaConfig(format!(
            "schema '{}': the top-level anchor cannot carry $list",
            template
        )));
    }
    let root = FieldSpec::root(children);
    root.validate()?;
    Ok(root)
}

/// Validated schemas keyed by query template name. Loaded once, read-only after.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, FieldSpec>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { schemas: HashMap::new() }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let node: ConfigNode = serde_json::from_str(json)
            .map_err(|e| Error::SchemaConfig(format!("invalid schema file: {}", e)))?;
        let ConfigNode::Nested(entries) = node else {
            return Err(Error::SchemaConfig(
                "schema file must be an object keyed by template name".to_string(),
            ));
        };

        let mut registry = Self::new();
        for (template, node) in &entries {
            let schema = build_schema(template, node)?;
            registry.schemas.insert(template.clone(), schema);
        }
        tracing::debug!(schemas = registry.schemas.len(), "loaded regrouping schemas");
        Ok(registry)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read schema file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Register a hand-built schema after validating it.
    pub fn insert(&mut self, template: impl Into<String>, schema: FieldSpec) -> Result<()> {
        schema.validate()?;
        self.schemas.insert(template.into(), schema);
        Ok(())
    }

    pub fn get(&self, template: &str) -> Result<&FieldSpec> {
        self.schemas.get(template).ok_or_else(|| {
            Error::SchemaConfig(format!("no schema configured for template '{}'", template))
        })
    }

    pub fn contains(&self, template: &str) -> bool {
        self.schemas.contains_key(template)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
