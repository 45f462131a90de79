//! Header codec
//!
//! Converts request and response headers between three shapes:
//! - the blocking gateway's environ map (`HTTP_ACCEPT_ENCODING` style keys)
//! - the core's normalized [`HeaderMap`] (lowercase hyphenated names)
//! - the event gateway's ordered `(name, value)` byte pairs
//!
//! Every function here is total. Entries that cannot be represented in the
//! target shape are skipped rather than reported.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Prefix carried by request headers in an environ map
pub const ENVIRON_PREFIX: &str = "HTTP_";

/// Environ keys that carry a header without the prefix
const UNPREFIXED_KEYS: [(&str, &str); 2] = [
    ("CONTENT_TYPE", "content-type"),
    ("CONTENT_LENGTH", "content-length"),
];

/// Response headers in the core's canonical casing, in emission order
pub type HeaderPairs = Vec<(String, String)>;

/// Translate an environ key into a lowercase header name
///
/// Returns `None` for keys that do not describe a request header.
///
/// # Examples
/// ```
/// use static_responder::http::headers::header_name_for_key;
/// assert_eq!(header_name_for_key("HTTP_ACCEPT_ENCODING").as_deref(), Some("accept-encoding"));
/// assert_eq!(header_name_for_key("CONTENT_LENGTH").as_deref(), Some("content-length"));
/// assert_eq!(header_name_for_key("PATH_INFO"), None);
/// ```
pub fn header_name_for_key(key: &str) -> Option<String> {
    if let Some((_, name)) = UNPREFIXED_KEYS.iter().find(|(k, _)| *k == key) {
        return Some((*name).to_string());
    }
    let name = key.strip_prefix(ENVIRON_PREFIX)?;
    if name.is_empty() {
        return None;
    }
    Some(name.replace('_', "-").to_ascii_lowercase())
}

/// Translate a header name into its environ key
pub fn key_for_header_name(name: &str) -> String {
    if let Some((key, _)) = UNPREFIXED_KEYS
        .iter()
        .find(|(_, n)| name.eq_ignore_ascii_case(n))
    {
        return (*key).to_string();
    }
    format!(
        "{ENVIRON_PREFIX}{}",
        name.replace('-', "_").to_ascii_uppercase()
    )
}

/// Build the core header map from an environ map
pub fn from_environ(environ: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in environ {
        let Some(name) = header_name_for_key(key) else {
            continue;
        };
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        let Some(value) = latin1_encode(value).and_then(|v| HeaderValue::from_bytes(&v).ok())
        else {
            continue;
        };
        headers.insert(name, value);
    }
    headers
}

/// Build an environ-style map from the core header map
///
/// Repeated headers are joined with `,` the way the environ convention expects.
pub fn to_environ(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let value = headers
                .get_all(name)
                .iter()
                .map(|v| latin1_decode(v.as_bytes()))
                .collect::<Vec<_>>()
                .join(",");
            (key_for_header_name(name.as_str()), value)
        })
        .collect()
}

/// Build the core header map from event-gateway byte pairs
///
/// Names are lowercased. Repeated names keep every value in arrival order.
pub fn from_pairs(pairs: &[(Bytes, Bytes)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name),
            HeaderValue::from_bytes(value),
        ) else {
            continue;
        };
        headers.append(name, value);
    }
    headers
}

/// Convert response headers into event-gateway byte pairs
///
/// Names are forced to lowercase and order is kept. Values are written as
/// latin-1 so they invert [`to_text_pairs`]; a value holding a char past
/// U+00FF is written as UTF-8 instead.
///
/// # Examples
/// ```
/// use static_responder::http::headers::to_byte_pairs;
/// let pairs = to_byte_pairs(&[("ETag".to_string(), "\"ada\"".to_string())]);
/// assert_eq!(&pairs[0].0[..], b"etag");
/// ```
pub fn to_byte_pairs<N, V>(headers: &[(N, V)]) -> Vec<(Bytes, Bytes)>
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .iter()
        .map(|(name, value)| {
            (
                Bytes::from(name.as_ref().to_ascii_lowercase()),
                latin1_encode(value.as_ref())
                    .map_or_else(|| Bytes::copy_from_slice(value.as_ref().as_bytes()), Bytes::from),
            )
        })
        .collect()
}

/// Convert event-gateway byte pairs back into textual pairs
pub fn to_text_pairs(pairs: &[(Bytes, Bytes)]) -> HeaderPairs {
    pairs
        .iter()
        .map(|(name, value)| (latin1_decode(name), latin1_decode(value)))
        .collect()
}

/// Decode bytes one-to-one into chars, so any byte sequence survives a round trip
fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`latin1_decode`]; `None` when a char is outside latin-1
fn latin1_encode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}
