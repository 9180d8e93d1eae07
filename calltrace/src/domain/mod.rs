//! Domain model for calltrace
//!
//! Core event types plus the structured errors for the two fallible
//! setup paths (plugin loading, relay transport).

pub mod errors;
pub mod types;

pub use errors::{PluginError, TransportError};
pub use types::{CallEvent, CodeAddr, EntryEvent, ExitEvent, FrameDescriptor};
