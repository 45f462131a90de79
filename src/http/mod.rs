//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the responder and both gateways:
//! header conversion, block streaming, validators, range parsing and MIME lookup.

pub mod blocks;
pub mod cache;
pub mod headers;
pub mod mime;
pub mod range;

// Re-export commonly used types
pub use blocks::{read_blocks, BlockReader};
pub use headers::HeaderPairs;
pub use range::{parse_range_header, RangeParseResult, RangeRequest};
