//! Logger module
//!
//! Logging helpers for the responder and the server binary:
//! - server lifecycle lines
//! - access lines in several formats
//! - errors and warnings, optionally redirected to files
//!
//! Before [`init`] runs, everything goes to stdout/stderr.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Static responder started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Gateway: {}", config.server.gateway));
    write_info(&format!(
        "Serving: {} at {}",
        config.statics.root, config.statics.prefix
    ));
    write_info(&format!("Block size: {} bytes", config.statics.block_size));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_shutdown() {
    write_info("[SHUTDOWN] Interrupt received, stopping");
}

pub fn log_files_registered(count: usize, root: &Path) {
    write_info(&format!(
        "[Files] Registered {count} files from {}",
        root.display()
    ));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// A representation came up short of its declared length mid-stream
pub fn log_truncated(expected: u64, read: u64) {
    write_error(&format!(
        "[ERROR] Content truncated: declared {expected} bytes, read {read}"
    ));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_info(&entry.format(format));
}
