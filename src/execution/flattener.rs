//! Row flattening.
//!
//! Strips the SPARQL binding envelope from every column and runs the literal
//! through the decoder, producing plain `column -> Scalar` rows. Row and column
//! order is preserved.
//!
//! # Example
//!
//! ```ignore
//! use biograph::execution::flattener::flatten;
//!
//! let rows = flatten(parse_results(&body)?)?;
//! assert_eq!(rows[0].get("count"), Some(&Scalar::Integer(12)));
//! ```

use crate::core::{decode, Row, Scalar};
use crate::error::{Error, Result};
use crate::parsing::sparql_results::{RawRow, RawValue};
use serde_json::Value as Json;

/// Flatten a whole result set.
///
/// A literal that does not match its declared datatype fails the whole call
/// with [`Error::RowDecode`] naming the row and column.
pub fn flatten(rows: Vec<RawRow>) -> Result<Vec<Row>> {
    let flattened = rows
        .into_iter()
        .enumerate()
        .map(|(index, raw)| flatten_row(index, raw))
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(rows = flattened.len(), "flattened result set");
    Ok(flattened)
}

/// Flatten a single row. `index` is only used for error reporting.
pub fn flatten_row(index: usize, raw: RawRow) -> Result<Row> {
    let mut row = Row::new();
    for (column, value) in raw {
        let scalar = match value {
            RawValue::Binding(binding) => decode(&binding.to_literal()).map(Some),
            RawValue::Plain(json) => Ok(plain_to_scalar(json)),
        }
        .map_err(|e| Error::RowDecode { row: index, column: column.clone(), source: Box::new(e) })?;

        if let Some(scalar) = scalar {
            row.insert(column, scalar);
        }
    }
    Ok(row)
}

/// Convert a value that carried no binding envelope. `null` means "not bound"
/// and yields `None`; an object with a `value` key is unwrapped first.
fn plain_to_scalar(json: Json) -> Option<Scalar> {
    match json {
        Json::Null => None,
        Json::Bool(b) => Some(Scalar::Boolean(b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Some(Scalar::Integer(i)),
            None => n.as_f64().map(Scalar::Float),
        },
        Json::String(s) => Some(Scalar::String(s)),
        Json::Object(mut map) if map.contains_key("value") => {
            map.remove("value").and_then(plain_to_scalar)
        }
        other => Some(Scalar::String(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::literal::{XSD_DATE_TIME, XSD_INTEGER};
    use crate::parsing::sparql_results::Binding;
    use serde_json::json;

    #[test]
    fn test_flatten_decodes_typed_literals() {
        let raw = RawRow::new()
            .with("person", Binding::uri("http://example.org/p/1"))
            .with("count", Binding::typed_literal("12", XSD_INTEGER))
            .with("born", Binding::typed_literal("1850-01-01T00:00:00Z", XSD_DATE_TIME));

        let rows = flatten(vec![raw]).unwrap();
        assert_eq!(rows[0].get("person"), Some(&Scalar::from("http://example.org/p/1")));
        assert_eq!(rows[0].get("count"), Some(&Scalar::Integer(12)));
        assert!(rows[0].get("born").unwrap().as_datetime().is_some());
    }

    #[test]
    fn test_flatten_preserves_order() {
        let raws = vec![
            RawRow::new().with("b", Binding::literal("1")).with("a", Binding::literal("2")),
            RawRow::new().with("a", Binding::literal("3")),
        ];
        let rows = flatten(raws).unwrap();
        assert_eq!(rows.len(), 2);
        let names: Vec<&str> = rows[0].iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(rows[1].get("a"), Some(&Scalar::from("3")));
    }

    #[test]
    fn test_plain_values() {
        let raw = RawRow::new()
            .with("n", RawValue::Plain(json!(4)))
            .with("x", RawValue::Plain(json!(0.5)))
            .with("flag", RawValue::Plain(json!(true)))
            .with("missing", RawValue::Plain(Json::Null))
            .with("wrapped", RawValue::Plain(json!({"value": 9})))
            .with("list", RawValue::Plain(json!([1, 2])));

        let row = flatten_row(0, raw).unwrap();
        assert_eq!(row.get("n"), Some(&Scalar::Integer(4)));
        assert_eq!(row.get("x"), Some(&Scalar::Float(0.5)));
        assert_eq!(row.get("flag"), Some(&Scalar::Boolean(true)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get("wrapped"), Some(&Scalar::Integer(9)));
        assert_eq!(row.get("list"), Some(&Scalar::from("[1,2]")));
    }

    #[test]
    fn test_decode_failure_names_row_and_column() {
        let raws = vec![
            RawRow::new().with("count", Binding::typed_literal("1", XSD_INTEGER)),
            RawRow::new().with("count", Binding::typed_literal("many", XSD_INTEGER)),
        ];
        match flatten(raws) {
            Err(Error::RowDecode { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "count");
            }
            other => panic!("expected a row decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(flatten(Vec::new()).unwrap().is_empty());
    }
}
