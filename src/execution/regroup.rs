//! Regrouping engine.
//!
//! A SPARQL query that walks person → event → role → place → related entity
//! returns one row per combination of those bindings. This module folds such a
//! flat row set back into nested objects, driven by a [`FieldSpec`] schema:
//!
//! 1. rows are partitioned by the distinct values of the level's anchor column,
//!    in order of first appearance;
//! 2. every leaf field collects the distinct values of its column within the
//!    partition (several values promote the field to a list even when the schema
//!    declares it scalar);
//! 3. every nested field recurses on the partition rows in which its own anchor
//!    is bound;
//! 4. columns the schema never mentions are kept verbatim on the top-level
//!    objects as `_additional_values`.

use crate::core::{Row, Scalar};
use crate::error::{Error, Result};
use crate::parsing::schema_config::FieldSpec;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeSet, HashMap};

/// Name under which unmapped columns are serialised.
pub const ADDITIONAL_VALUES_FIELD: &str = "_additional_values";

/// A field value of a regrouped object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Object(GroupedObject),
    Objects(Vec<GroupedObject>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar values regardless of cardinality.
    pub fn scalars(&self) -> Vec<&Scalar> {
        match self {
            Value::Scalar(s) => vec![s],
            Value::List(values) => values.iter().collect(),
            Value::Object(_) | Value::Objects(_) => Vec::new(),
        }
    }

    /// Nested objects regardless of cardinality.
    pub fn objects(&self) -> Vec<&GroupedObject> {
        match self {
            Value::Object(o) => vec![o],
            Value::Objects(objects) => objects.iter().collect(),
            Value::Scalar(_) | Value::List(_) => Vec::new(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::List(values) => values.serialize(serializer),
            Value::Object(o) => o.serialize(serializer),
            Value::Objects(objects) => objects.serialize(serializer),
        }
    }
}

/// One reconstructed object. Fields keep schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedObject {
    fields: Vec<(String, Value)>,
    additional: Vec<Row>,
}

impl GroupedObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, value)| value)
    }

    /// Shortcut for a single scalar field.
    pub fn scalar(&self, field: &str) -> Option<&Scalar> {
        self.get(field).and_then(Value::as_scalar)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Row fragments made of columns no schema field consumed.
    pub fn additional_values(&self) -> &[Row] {
        &self.additional
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for GroupedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let extra = usize::from(!self.additional.is_empty());
        let mut map = serializer.serialize_map(Some(self.fields.len() + extra))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        if !self.additional.is_empty() {
            map.serialize_entry(ADDITIONAL_VALUES_FIELD, &self.additional)?;
        }
        map.end()
    }
}

/// Regroup a flat row set into nested objects.
///
/// `parent_filter` restricts the input to rows whose `column` equals `value`
/// before grouping; callers use it to pick one anchor lineage out of a row set
/// that carries several side by side.
///
/// An empty row set yields an empty result. A schema level with zero or several
/// anchors is an [`Error::SchemaConfig`].
pub fn regroup(
    rows: &[Row],
    schema: &FieldSpec,
    parent_filter: Option<(&str, &Scalar)>,
) -> Result<Vec<GroupedObject>> {
    schema.validate()?;

    let selected: Vec<&Row> = match parent_filter {
        Some((column, value)) => rows.iter().filter(|r| r.get(column) == Some(value)).collect(),
        None => rows.iter().collect(),
    };
    if selected.is_empty() {
        return Ok(Vec::new());
    }

    let mapped = schema.referenced_columns();
    let objects = regroup_level(&selected, schema, Some(&mapped))?;
    tracing::debug!(rows = selected.len(), objects = objects.len(), "regrouped result set");
    Ok(objects)
}

/// One nesting level. `mapped` is only passed at the top level, where unmapped
/// columns are collected.
fn regroup_level(
    rows: &[&Row],
    schema: &FieldSpec,
    mapped: Option<&BTreeSet<&str>>,
) -> Result<Vec<GroupedObject>> {
    let anchor_column = schema.anchor_column()?;
    let partitions = partition(rows, anchor_column);
    let mut objects = Vec::with_capacity(partitions.len());

    for (anchor_value, members) in partitions {
        let mut object = GroupedObject::new();

        for child in &schema.children {
            if child.is_nested() {
                if let Some(value) = regroup_nested(&members, child, anchor_value)? {
                    object.insert(child.output_name.clone(), value);
                }
                continue;
            }

            let column = child.source_column.as_deref().ok_or_else(|| {
                Error::SchemaConfig(format!("field '{}' has no source column", child.output_name))
            })?;
            let mut values = distinct_values(&members, column);
            let value = match values.len() {
                0 => continue,
                1 if !child.is_list => Value::Scalar(values.remove(0)),
                _ => Value::List(values),
            };
            object.insert(child.output_name.clone(), value);
        }

        if let Some(mapped) = mapped {
            object.additional = unmapped_fragments(&members, mapped);
        }
        objects.push(object);
    }

    Ok(objects)
}

fn regroup_nested(
    members: &[&Row],
    child: &FieldSpec,
    parent_anchor: &Scalar,
) -> Result<Option<Value>> {
    let child_anchor = child.anchor_column()?;
    let participating: Vec<&Row> =
        members.iter().copied().filter(|row| row.contains(child_anchor)).collect();
    if participating.is_empty() {
        return Ok(None);
    }

    let nested = regroup_level(&participating, child, None)?;
    if child.is_list {
        return Ok(Some(Value::Objects(nested)));
    }

    if nested.len() > 1 {
        tracing::warn!(
            field = %child.output_name,
            parent = %parent_anchor,
            dropped = nested.len() - 1,
            "single-valued nested field matched several objects, keeping the first"
        );
    }
    Ok(nested.into_iter().next().map(Value::Object))
}

/// Partition rows by anchor value, in order of first appearance. Rows without
/// the anchor column are left out.
fn partition<'r>(rows: &[&'r Row], anchor_column: &str) -> Vec<(&'r Scalar, Vec<&'r Row>)> {
    let mut index: HashMap<&Scalar, usize> = HashMap::new();
    let mut partitions: Vec<(&Scalar, Vec<&Row>)> = Vec::new();

    for &row in rows {
        let Some(anchor) = row.get(anchor_column) else {
            continue;
        };
        match index.get(anchor) {
            Some(&slot) => partitions[slot].1.push(row),
            None => {
                index.insert(anchor, partitions.len());
                partitions.push((anchor, vec![row]));
            }
        }
    }
    partitions
}

/// Distinct values of `column` across `rows`, first-seen order.
fn distinct_values(rows: &[&Row], column: &str) -> Vec<Scalar> {
    let mut values: Vec<Scalar> = Vec::new();
    for value in rows.iter().copied().filter_map(|row| row.get(column)) {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
    values
}

fn unmapped_fragments(rows: &[&Row], mapped: &BTreeSet<&str>) -> Vec<Row> {
    let mut fragments: Vec<Row> = Vec::new();
    for &row in rows {
        let fragment: Row = row
            .iter()
            .filter(|(column, _)| !mapped.contains(column))
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();
        if !fragment.is_empty() && !fragments.contains(&fragment) {
            fragments.push(fragment);
        }
    }
    fragments
}

/// Expand grouped objects back into flat rows, the inverse of [`regroup`].
///
/// Produces the cartesian product of every list-valued field and nested list,
/// which is the shape a SPARQL join would have returned. Auxiliary
/// `_additional_values` fragments are not expanded.
pub fn expand(objects: &[GroupedObject], schema: &FieldSpec) -> Vec<Row> {
    objects.iter().flat_map(|object| expand_object(object, schema)).collect()
}

fn expand_object(object: &GroupedObject, schema: &FieldSpec) -> Vec<Row> {
    let mut rows = vec![Row::new()];

    for child in &schema.children {
        let Some(value) = object.get(&child.output_name) else {
            continue;
        };

        let options: Vec<Row> = if child.is_nested() {
            value.objects().into_iter().flat_map(|nested| expand_object(nested, child)).collect()
        } else {
            let Some(column) = child.source_column.as_deref() else {
                continue;
            };
            value
                .scalars()
                .into_iter()
                .map(|scalar| Row::from_pairs([(column, scalar.clone())]))
                .collect()
        };
        if options.is_empty() {
            continue;
        }

        rows = rows
            .iter()
            .flat_map(|base| {
                options.iter().map(move |option| {
                    let mut combined = base.clone();
                    for (column, value) in option.iter() {
                        combined.insert(column, value.clone());
                    }
                    combined
                })
            })
            .collect();
    }
    rows
}
