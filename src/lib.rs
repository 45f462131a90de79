//! Static file responder
//!
//! Serves files from a directory with validators, conditional requests,
//! single byte ranges and pre-compressed variants. One sans-io responder
//! ([`responder::ResponseEvents`]) drives two protocol gateways: an
//! asynchronous event exchange and a blocking call-and-return style.

pub mod config;
pub mod error;
pub mod event;
pub mod file;
pub mod gateway;
pub mod http;
pub mod logger;
pub mod registry;
pub mod responder;
pub mod server;

pub use error::{Error, Result};
