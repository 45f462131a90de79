//! Byte range requests
//!
//! Only a single `bytes` range is honoured. Anything the parser does not
//! understand (other units, multiple ranges, junk) reads as "no range", so the
//! caller serves the whole representation.

/// A range resolved against a concrete representation size
///
/// Both ends are inclusive and always inside the representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: u64,
}

impl RangeRequest {
    pub const fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value, e.g. `bytes 2-4/10`
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// Outcome of reading a `Range` header
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    Valid(RangeRequest),
    /// Well formed, but selects nothing inside the representation
    NotSatisfiable,
    /// Absent or not understood
    None,
}

/// A byte-range-spec before the representation size is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeSpec {
    /// `first-` or `first-last`
    Bounded { first: u64, last: Option<u64> },
    /// `-length`: the final `length` bytes
    Suffix { length: u64 },
}

impl RangeSpec {
    fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }
        let (first, last) = spec.split_once('-')?;
        let (first, last) = (first.trim(), last.trim());

        if first.is_empty() {
            return Some(Self::Suffix {
                length: last.parse().ok()?,
            });
        }
        let first = first.parse().ok()?;
        let last = match last {
            "" => None,
            last => Some(last.parse().ok()?),
        };
        Some(Self::Bounded { first, last })
    }

    fn resolve(self, size: u64) -> RangeParseResult {
        let Some(final_byte) = size.checked_sub(1) else {
            return RangeParseResult::NotSatisfiable;
        };
        let range = match self {
            Self::Suffix { length: 0 } => return RangeParseResult::NotSatisfiable,
            Self::Suffix { length } => RangeRequest {
                start: size.saturating_sub(length),
                end: final_byte,
            },
            Self::Bounded { first, last } => {
                if first > final_byte || last.is_some_and(|last| last < first) {
                    return RangeParseResult::NotSatisfiable;
                }
                RangeRequest {
                    start: first,
                    end: last.map_or(final_byte, |last| last.min(final_byte)),
                }
            }
        };
        RangeParseResult::Valid(range)
    }
}

/// Read a `Range` header against a representation of `size` bytes
///
/// Accepts `bytes=first-last`, `bytes=first-` and `bytes=-length`. The last
/// position is clamped to the end of the representation.
///
/// # Examples
/// ```
/// use static_responder::http::range::{parse_range_header, RangeParseResult, RangeRequest};
///
/// assert_eq!(
///     parse_range_header(Some("bytes=-3"), 20),
///     RangeParseResult::Valid(RangeRequest { start: 17, end: 19 })
/// );
/// assert_eq!(parse_range_header(None, 20), RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, size: u64) -> RangeParseResult {
    range_header
        .and_then(RangeSpec::parse)
        .map_or(RangeParseResult::None, |spec| spec.resolve(size))
}
