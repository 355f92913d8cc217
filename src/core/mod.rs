//! Core data structures for the Biograph regrouping engine

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

pub mod literal;
pub use literal::{decode, Literal};

/// A decoded RDF value.
///
/// Closed set of the native types a typed literal can turn into. Anything the
/// decoder does not recognise stays a `String`.
#[derive(Debug, Clone)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<FixedOffset>),
}

impl Scalar {
    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Boolean(_) => "boolean",
            Scalar::DateTime(_) => "dateTime",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Scalar::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so that distinct-value sets stay well defined
// even in the presence of NaN.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::String(a), Scalar::String(b)) => a == b,
            (Scalar::Integer(a), Scalar::Integer(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => a == b,
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::String(s) => s.hash(state),
            Scalar::Integer(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Boolean(b) => b.hash(state),
            Scalar::DateTime(dt) => dt.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::String(s) => serializer.serialize_str(s),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::Boolean(b) => serializer.serialize_bool(*b),
            Scalar::DateTime(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl From<DateTime<FixedOffset>> for Scalar {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Scalar::DateTime(dt)
    }
}

/// One flattened result row: an ordered mapping from column name to value.
///
/// Columns that did not bind for a given join path are absent rather than null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Scalar)>,
}

impl Row {
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Build a row from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.insert(k, v);
        }
        row
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Insert a column, replacing the value in place if the column already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Remove a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Scalar> {
        let position = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(position).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Row::from_pairs(iter)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::from_pairs([("b", "1"), ("a", "2"), ("c", "3")]);
        let names: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_row_insert_replaces_in_place() {
        let mut row = Row::from_pairs([("a", 1i64), ("b", 2i64)]);
        row.insert("a", 10i64);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&Scalar::Integer(10)));
        assert_eq!(row.iter().next().map(|(k, _)| k), Some("a"));
    }

    #[test]
    fn test_row_remove() {
        let mut row = Row::from_pairs([("a", 1i64), ("b", 2i64)]);
        assert_eq!(row.remove("a"), Some(Scalar::Integer(1)));
        assert_eq!(row.remove("a"), None);
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_scalar_equality_is_type_strict() {
        assert_ne!(Scalar::from("1"), Scalar::Integer(1));
        assert_ne!(Scalar::Integer(1), Scalar::Float(1.0));
    }

    #[test]
    fn test_nan_is_deduplicated() {
        let mut set = HashSet::new();
        set.insert(Scalar::Float(f64::NAN));
        set.insert(Scalar::Float(f64::NAN));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_scalar_serialization() {
        let dt = DateTime::parse_from_rfc3339("1850-03-01T00:00:00+00:00").unwrap();
        let row = Row::from_pairs([
            ("name", Scalar::from("Ada")),
            ("born", Scalar::DateTime(dt)),
            ("children", Scalar::Integer(3)),
        ]);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["born"], "1850-03-01T00:00:00Z");
        assert_eq!(json["children"], 3);
    }
}
