//! SPARQL 1.1 Query Results JSON parsing.
//!
//! Endpoints answer `SELECT` queries with a document of the form
//!
//! ```json
//! {"head": {"vars": ["person", "label"]},
//!  "results": {"bindings": [
//!     {"person": {"type": "uri", "value": "http://..."},
//!      "label": {"type": "literal", "value": "Ada", "xml:lang": "en"}}]}}
//! ```
//!
//! Each binding object becomes a [`RawRow`] whose columns keep the order in
//! which they appear in the document.

use crate::core::Literal;
use crate::error::Result;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value envelope a SPARQL endpoint wraps around every bound term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// `uri`, `literal`, `typed-literal` or `bnode`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", alias = "lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Binding {
    pub fn uri(value: impl Into<String>) -> Self {
        Self { kind: Some("uri".to_string()), value: value.into(), datatype: None, lang: None }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self { kind: Some("literal".to_string()), value: value.into(), datatype: None, lang: None }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            kind: Some("literal".to_string()),
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    pub fn to_literal(&self) -> Literal {
        Literal { raw: self.value.clone(), datatype: self.datatype.clone(), lang: self.lang.clone() }
    }
}

/// A column value before flattening: a binding envelope or any other JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Binding(Binding),
    Plain(serde_json::Value),
}

impl From<Binding> for RawValue {
    fn from(binding: Binding) -> Self {
        RawValue::Binding(binding)
    }
}

/// One solution of a SPARQL result set, columns in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.columns.push((column.into(), value.into()));
    }

    /// Builder-style variant of [`RawRow::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for RawRow {
    type Item = (String, RawValue);
    type IntoIter = std::vec::IntoIter<(String, RawValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<'de> Deserialize<'de> for RawRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawRowVisitor;

        impl<'de> Visitor<'de> for RawRowVisitor {
            type Value = RawRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a SPARQL binding object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawRow, A::Error> {
                let mut row = RawRow::new();
                while let Some((key, value)) = map.next_entry::<String, RawValue>()? {
                    row.push(key, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RawRowVisitor)
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsBody {
    #[serde(default)]
    pub bindings: Vec<RawRow>,
}

/// A complete SPARQL JSON results document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: ResultsHead,
    #[serde(default)]
    pub results: ResultsBody,
    /// Present for `ASK` queries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
}

impl SparqlResults {
    pub fn into_rows(self) -> Vec<RawRow> {
        self.results.bindings
    }
}

/// Parse a SPARQL JSON results document into raw rows.
pub fn parse_results(json: &str) -> Result<Vec<RawRow>> {
    let results: SparqlResults = serde_json::from_str(json)?;
    Ok(results.into_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "head": {"vars": ["person", "label", "born"]},
        "results": {"bindings": [
            {"person": {"type": "uri", "value": "http://example.org/p/1"},
             "label": {"type": "literal", "value": "Ada", "xml:lang": "en"},
             "born": {"type": "literal", "value": "1815-12-10T00:00:00Z",
                      "datatype": "http://www.w3.org/2001/XMLSchema#dateTime"}},
            {"person": {"type": "uri", "value": "http://example.org/p/2"}}
        ]}
    }"#;

    #[test]
    fn test_parse_results_keeps_document_order() {
        let rows = parse_results(DOCUMENT).unwrap();
        assert_eq!(rows.len(), 2);
        let names: Vec<&str> = rows[0].iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["person", "label", "born"]);
        assert_eq!(rows[1].len(), 1);
    }

    #[test]
    fn test_binding_fields() {
        let rows = parse_results(DOCUMENT).unwrap();
        match rows[0].get("label") {
            Some(RawValue::Binding(b)) => {
                assert_eq!(b.value, "Ada");
                assert_eq!(b.lang.as_deref(), Some("en"));
                assert_eq!(b.kind.as_deref(), Some("literal"));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_plain_values_are_kept() {
        let rows = parse_results(
            r#"{"results": {"bindings": [{"count": 3, "note": {"text": "x"}}]}}"#,
        )
        .unwrap();
        assert_eq!(rows[0].get("count"), Some(&RawValue::Plain(serde_json::json!(3))));
        assert!(matches!(rows[0].get("note"), Some(RawValue::Plain(_))));
    }

    #[test]
    fn test_ask_result_has_no_rows() {
        let rows = parse_results(r#"{"head": {}, "boolean": true}"#).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(parse_results("{\"results\": {\"bindings\": [1, 2]}}").is_err());
    }
}
