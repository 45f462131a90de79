//! Protocol gateways
//!
//! Two thin adapters present the same responder through different protocol
//! styles. Each one looks the request path up in a [`FileRegistry`], serves
//! matches itself and forwards everything else to the application it wraps.
//!
//! [`FileRegistry`]: crate::registry::FileRegistry

pub mod blocking;
pub mod events;

use hyper::StatusCode;

/// `200 OK` style status line
pub fn status_line(status: StatusCode) -> String {
    format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
}

/// Downstream application that answers every request with 404
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

const NOT_FOUND_BODY: &str = "Not found";
