//! Typed RDF literal decoding.
//!
//! Coerces the lexical form of a literal into a [`Scalar`] according to its
//! datatype IRI. Only the datatypes the graph actually uses are recognised:
//!
//! | datatype          | result              |
//! |-------------------|---------------------|
//! | `xsd:dateTime`    | `Scalar::DateTime`  |
//! | `xsd:integer`     | `Scalar::Integer`   |
//! | `xsd:boolean`     | `Scalar::Boolean`   |
//! | `xsd:float`       | `Scalar::Float`     |
//!
//! Every other datatype (and untyped literals) pass through as a string. A value
//! that does not match a recognised datatype is an error, never a silent string.

use super::Scalar;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";

/// An RDF literal as delivered by a SPARQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Literal {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), datatype: None, lang: None }
    }

    pub fn typed(raw: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self { raw: raw.into(), datatype: Some(datatype.into()), lang: None }
    }

    pub fn lang_tagged(raw: impl Into<String>, lang: impl Into<String>) -> Self {
        Self { raw: raw.into(), datatype: None, lang: Some(lang.into()) }
    }
}

/// Decode a literal into its native scalar.
pub fn decode(literal: &Literal) -> Result<Scalar> {
    let Some(datatype) = literal.datatype.as_deref() else {
        return Ok(Scalar::String(literal.raw.clone()));
    };
    let raw = literal.raw.as_str();

    match datatype {
        XSD_DATE_TIME => parse_date_time(raw).map(Scalar::DateTime),
        XSD_INTEGER => raw
            .trim()
            .trim_start_matches('+')
            .parse::<i64>()
            .map(Scalar::Integer)
            .map_err(|e| decode_error("integer", raw, e)),
        XSD_BOOLEAN => match raw.trim() {
            "true" | "1" => Ok(Scalar::Boolean(true)),
            "false" | "0" => Ok(Scalar::Boolean(false)),
            _ => Err(decode_error("boolean", raw, "expected true, false, 1 or 0")),
        },
        XSD_FLOAT => parse_float(raw).map(Scalar::Float),
        _ => Ok(Scalar::String(literal.raw.clone())),
    }
}

/// Parse an `xsd:dateTime` lexical form.
///
/// A trailing `Z` is UTC. A value without any offset is taken as UTC too.
/// Seconds may be left out (`1850-01-01T00:00`).
pub fn parse_date_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    let normalized = match trimmed.strip_suffix('Z') {
        Some(stripped) => format!("{}+00:00", stripped),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt);
    }

    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| decode_error("dateTime", raw, e))
}

fn parse_float(raw: &str) -> Result<f64> {
    match raw.trim() {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        // Rust accepts "inf"/"nan" spellings that XSD does not.
        other if other.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            Err(decode_error("float", raw, "not an xsd:float lexical form"))
        }
        other => other.parse::<f64>().map_err(|e| decode_error("float", raw, e)),
    }
}

fn decode_error(datatype: &str, value: &str, reason: impl ToString) -> Error {
    Error::Decode {
        datatype: datatype.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Midnight UTC of the given date, as a fixed-offset date-time.
pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}
