//! Error types
//!
//! A single error enum shared by the block reader, the responder and both gateways.
//! Method-not-allowed and malformed `Range` headers are normal outcomes and never
//! surface here.

use std::path::PathBuf;

/// Errors that abort the in-flight request
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte source ran dry before the declared content length was produced
    #[error("content truncated: expected {expected} bytes, source produced {read}")]
    TruncatedContent { expected: u64, read: u64 },

    /// An event arrived that the protocol does not allow at this point,
    /// such as an inbound type outside the request vocabulary
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Opening, seeking or reading the representation failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// No metadata snapshot exists for the path
    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),

    /// The metadata snapshot describes something other than a regular file
    #[error("not a regular file: {}", .0.display())]
    NotARegularFile(PathBuf),

    /// The transport dropped the outbound side of the channel
    #[error("response channel closed")]
    ChannelClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
