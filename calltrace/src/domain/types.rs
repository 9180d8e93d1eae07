//! Core event types: code addresses, frame descriptors, call events

use std::ffi::c_void;
use std::fmt;

/// Address of a code location in the instrumented process.
///
/// Never dereferenced by this crate; it exists only to be formatted and
/// handed to sinks as an opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeAddr(pub usize);

impl CodeAddr {
    /// The address as an opaque C pointer for the plugin ABI.
    #[must_use]
    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }
}

impl fmt::Display for CodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for CodeAddr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

/// One captured stack frame: raw address plus best-effort symbol name.
///
/// Produced once per entry event and owned by that event; rendered as a
/// single opaque line of text everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    addr: CodeAddr,
    symbol: Option<String>,
}

impl FrameDescriptor {
    #[must_use]
    pub fn new(addr: CodeAddr, symbol: Option<String>) -> Self {
        Self { addr, symbol }
    }

    /// A descriptor with no symbol information, just the raw address.
    #[must_use]
    pub fn raw(addr: CodeAddr) -> Self {
        Self::new(addr, None)
    }

    #[must_use]
    pub fn addr(&self) -> CodeAddr {
        self.addr
    }

    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{} ({symbol})", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// A function-entry event with its sampled stack.
///
/// `frames` is bounded by [`crate::capture::MAX_STACK_FRAMES`] and excludes
/// the capture routine's own frame.
#[derive(Debug, Clone)]
pub struct EntryEvent {
    pub function: CodeAddr,
    pub call_site: CodeAddr,
    pub frames: Vec<FrameDescriptor>,
}

/// A function-exit event. No stack is sampled on exit.
#[derive(Debug, Clone, Copy)]
pub struct ExitEvent {
    pub function: CodeAddr,
    pub call_site: CodeAddr,
}

/// One call event as delivered by the instrumentation hooks.
#[derive(Debug, Clone)]
pub enum CallEvent {
    Entry(EntryEvent),
    Exit(ExitEvent),
}
