//! Identifier encoding for URL paths.
//!
//! Entity IRIs contain slashes and cannot travel in a single path segment, so
//! the API hands them out URL-safe base64 encoded and decodes them on the way
//! back in.

use crate::error::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

/// Padded on encode, padding optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const API_PATH_MARKER: &str = "/v2/api";

/// Encode an IRI or decode an encoded id, whichever `value` is.
///
/// - a full API URL (`.../v2/api/.../<encoded>`) decodes its last segment
/// - anything else containing `/` is an IRI and gets encoded
/// - everything else is decoded
pub fn toggle_url_encoding(value: &str) -> Result<String> {
    if value.contains(API_PATH_MARKER) {
        let last = value.rsplit('/').next().unwrap_or_default();
        decode_id(last)
    } else if value.contains('/') {
        Ok(encode_id(value))
    } else {
        decode_id(value)
    }
}

/// Resolve a client-supplied id to an IRI. Encoded ids and API URLs are
/// decoded, plain IRIs pass through unchanged.
pub fn to_iri(value: &str) -> Result<String> {
    let value = value.trim();
    let iri = if value.contains('/') && !value.contains(API_PATH_MARKER) {
        value.to_string()
    } else {
        toggle_url_encoding(value)?
    };
    if iri.is_empty() || iri.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId(format!("{:?} is not an IRI", iri)));
    }
    Ok(iri)
}

pub fn encode_id(iri: &str) -> String {
    URL_SAFE_LENIENT.encode(iri.as_bytes())
}

pub fn decode_id(encoded: &str) -> Result<String> {
    let bytes = URL_SAFE_LENIENT
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidId(format!("{:?}: {}", encoded, e)))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidId(format!("{:?}: {}", encoded, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRI: &str = "http://apis.acdh.oeaw.ac.at/data/v5/person/42";

    #[test]
    fn test_toggle_is_an_involution_for_iris() {
        let encoded = toggle_url_encoding(IRI).unwrap();
        assert!(!encoded.contains('/'));
        assert_eq!(toggle_url_encoding(&encoded).unwrap(), IRI);
    }

    #[test]
    fn test_api_url_decodes_last_segment() {
        let url = format!("https://example.org/v2/api/entity/{}", encode_id(IRI));
        assert_eq!(toggle_url_encoding(&url).unwrap(), IRI);
    }

    #[test]
    fn test_unpadded_input_is_accepted() {
        let encoded = encode_id("http://ex.org/a");
        let unpadded = encoded.trim_end_matches('=');
        assert_eq!(decode_id(unpadded).unwrap(), "http://ex.org/a");
    }

    #[test]
    fn test_to_iri_accepts_both_forms() {
        assert_eq!(to_iri(IRI).unwrap(), IRI);
        assert_eq!(to_iri(&encode_id(IRI)).unwrap(), IRI);
        let url = format!("https://example.org/v2/api/entity/{}", encode_id(IRI));
        assert_eq!(to_iri(&url).unwrap(), IRI);
        assert!(matches!(to_iri(&encode_id("http://ex.org/a b")), Err(Error::InvalidId(_))));
        assert!(to_iri("").is_err());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(toggle_url_encoding("not*base64"), Err(Error::InvalidId(_))));
        // valid base64 for the bytes [0xff, 0xfe]
        assert!(matches!(decode_id("__4="), Err(Error::InvalidId(_))));
    }
}
