//! HTTP cache control module
//!
//! Provides validator generation (`ETag`, HTTP-date) and conditional request checks.

use chrono::{DateTime, NaiveDateTime, Utc};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Obsolete date formats a client may still send (RFC 850 and asctime)
const LEGACY_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Generate a strong `ETag` from file metadata
///
/// Identical `(mtime, size)` pairs always produce the same tag, and a change to
/// either produces a different one.
///
/// # Examples
/// ```
/// use static_responder::http::cache::generate_etag;
/// assert_eq!(generate_etag(1_000_000_000, 20), "\"3b9aca00-14\"");
/// ```
pub fn generate_etag(mtime: i64, size: u64) -> String {
    format!("\"{mtime:x}-{size:x}\"")
}

/// Format epoch seconds as an HTTP-date (`Sun, 09 Sep 2001 01:46:40 GMT`)
pub fn format_http_date(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .unwrap_or_default()
        .format(HTTP_DATE_FORMAT)
        .to_string()
}

/// Parse an HTTP-date into epoch seconds
///
/// Accepts the IMF-fixdate form plus the two obsolete forms; anything else is `None`.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.timestamp());
    }
    LEGACY_DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|date| date.and_utc().timestamp())
    })
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

/// Decide whether a conditional request can be answered with 304
///
/// `If-None-Match` wins whenever it is present; `If-Modified-Since` is only
/// consulted in its absence, and an unparseable date never matches.
pub fn is_not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    etag: &str,
    last_modified: i64,
) -> bool {
    if if_none_match.is_some() {
        return check_etag_match(if_none_match, etag);
    }
    if_modified_since
        .and_then(parse_http_date)
        .is_some_and(|since| since >= last_modified)
}

/// Cache control policy attached to served files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Private cache (browser cache only)
    Private(u32),
    /// No cache
    NoCache,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("max-age={max_age}, public"),
            Self::Private(max_age) => format!("max-age={max_age}, private"),
            Self::NoCache => "no-cache".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: i64 = 1_000_000_000;
    const DATE: &str = "Sun, 09 Sep 2001 01:46:40 GMT";

    #[test]
    fn test_etag_consistency() {
        assert_eq!(generate_etag(EPOCH, 20), generate_etag(EPOCH, 20));
        assert_ne!(generate_etag(EPOCH, 20), generate_etag(EPOCH, 21));
        assert_ne!(generate_etag(EPOCH, 20), generate_etag(EPOCH + 1, 20));
    }

    #[test]
    fn test_http_date() {
        assert_eq!(format_http_date(EPOCH), DATE);
        assert_eq!(parse_http_date(DATE), Some(EPOCH));
        assert_eq!(parse_http_date("Sunday, 09-Sep-01 01:46:40 GMT"), Some(EPOCH));
        assert_eq!(parse_http_date("Sun Sep  9 01:46:40 2001"), Some(EPOCH));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_if_modified_since() {
        let etag = generate_etag(EPOCH, 20);
        assert!(is_not_modified(None, Some(DATE), &etag, EPOCH));
        assert!(is_not_modified(None, Some("Mon, 10 Sep 2001 00:00:00 GMT"), &etag, EPOCH));
        assert!(!is_not_modified(None, Some("Sat, 08 Sep 2001 00:00:00 GMT"), &etag, EPOCH));
        assert!(!is_not_modified(None, Some("garbage"), &etag, EPOCH));
        assert!(!is_not_modified(None, None, &etag, EPOCH));
    }

    #[test]
    fn test_if_none_match_takes_precedence() {
        let etag = generate_etag(EPOCH, 20);
        assert!(!is_not_modified(Some("\"stale\""), Some(DATE), &etag, EPOCH));
        assert!(is_not_modified(Some(&etag), Some("garbage"), &etag, EPOCH));
    }

    #[test]
    fn test_cache_policy() {
        assert_eq!(CachePolicy::Public(3600).to_header_value(), "max-age=3600, public");
        assert_eq!(CachePolicy::Private(600).to_header_value(), "max-age=600, private");
        assert_eq!(CachePolicy::NoCache.to_header_value(), "no-cache");
    }
}
