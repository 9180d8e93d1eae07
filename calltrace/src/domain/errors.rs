//! Structured error types for calltrace
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these errors ever reach the instrumented program: setup errors
//! degrade the affected sink to "absent" and are logged.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the plugin loading protocol.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("failed to open notification library {path}: {detail}")]
    LibraryOpen { path: PathBuf, detail: String },

    #[error("symbol `{name}` not found in notification library: {detail}")]
    SymbolMissing { name: &'static str, detail: String },
}

/// Errors from relay transport setup and teardown.
///
/// Every variant implies the setup sequence already rolled back whatever it
/// had acquired before failing.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to allocate local socket name: {0}")]
    EndpointAllocation(#[source] io::Error),

    #[error("failed to bind local datagram socket {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("failed to connect to relay peer {path}: {source}")]
    Connect { path: PathBuf, source: io::Error },

    #[error("failed to set relay socket non-blocking: {0}")]
    Nonblocking(#[source] io::Error),

    #[error("failed to shut down relay socket read direction: {0}")]
    ReadShutdown(#[source] io::Error),
}
