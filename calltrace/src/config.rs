//! Startup configuration, read once from the process environment
//!
//! The environment is treated as a plain key→value lookup consulted a
//! single time; the resulting [`Config`] is immutable for the life of the
//! process.

use std::env;
use std::path::PathBuf;

/// Arms the whole agent: "on", "true" or "1", case-insensitive.
pub const ENV_EVENTS_ENABLED: &str = "EVENTS_ENABLED";

/// Path of a shared library exporting the two notifier entry points.
pub const ENV_EVENT_LIB_NAME: &str = "EVENT_LIB_NAME";

/// Filesystem path of the Unix-datagram peer receiving relay messages.
pub const ENV_EVENT_UNIX_SOCKET: &str = "EVENT_UNIX_SOCKET";

/// Whether the relay keeps its receive direction open for operator
/// commands. Compile-time default: nothing reads the socket yet, so the
/// channel is configured write-only.
pub const ACCEPT_REMOTE_COMMANDS: bool = false;

/// Process-wide configuration, built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub enabled: bool,
    pub plugin_path: Option<PathBuf>,
    pub relay_peer: Option<PathBuf>,
    pub accept_remote_commands: bool,
}

impl Config {
    /// Read the configuration from the real process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key→value lookup — the environment in production, a
    /// plain table in tests. Absent keys disable the corresponding
    /// feature; they are never errors.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            enabled: lookup(ENV_EVENTS_ENABLED).is_some_and(|value| is_truthy(&value)),
            plugin_path: lookup(ENV_EVENT_LIB_NAME).map(PathBuf::from),
            relay_peer: lookup(ENV_EVENT_UNIX_SOCKET).map(PathBuf::from),
            accept_remote_commands: ACCEPT_REMOTE_COMMANDS,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("on") || value.eq_ignore_ascii_case("true") || value == "1"
}
