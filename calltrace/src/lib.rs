//! # calltrace - a runtime call-tracing agent
//!
//! Every function entry and exit in an instrumented program is reported to
//! one or more interchangeable notification sinks without the program
//! knowing which sink is active:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            Instrumented Program              │
//! │   (compiler-inserted entry/exit hooks)       │
//! └──────────────────┬───────────────────────────┘
//!                    │ (function_addr, call_site_addr)
//!                    ▼
//! ┌──────────────────────────────────────────────┐
//! │              calltrace (this crate)          │
//! │                                              │
//! │  hooks ──▶ lifecycle ──▶ capture             │
//! │                │                             │
//! │                ▼                             │
//! │            dispatch ──┬──▶ plugin sink (SO)  │
//! │                       ├──▶ relay sink (UDS)  │
//! │                       └──▶ diagnostic sink   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`config`]: immutable startup configuration, read once from the
//!   process environment (`EVENTS_ENABLED`, `EVENT_LIB_NAME`,
//!   `EVENT_UNIX_SOCKET`)
//! - [`lifecycle`]: the [`Agent`] — one-time setup, steady-state event
//!   gating, idempotent teardown
//! - [`capture`]: bounded stack capture via the `backtrace` unwinder
//! - [`dispatch`]: fan-out of each event across the configured sinks,
//!   plugin before relay, diagnostic fallback when neither is configured
//! - [`plugin`]: dynamic plugin loading with all-or-nothing symbol
//!   resolution and rollback
//! - [`transport`]: non-blocking Unix-datagram relay with full setup
//!   rollback
//! - [`framing`]: serializing an event into bounded send-ready chunks with
//!   explicit truncation accounting
//! - [`sink`]: the sink abstraction and the always-available diagnostic
//!   sink
//! - [`hooks`]: C-ABI adapter exporting the `__cyg_profile_func_*` hook
//!   symbols and the constructor/destructor pair
//!
//! ## Delivery model
//!
//! Strictly fire-and-forget: no operation blocks, no failure is fatal to
//! the instrumented program. The worst case on any internal failure is the
//! silent loss of a notification.

pub mod capture;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod framing;
pub mod hooks;
pub mod lifecycle;
pub mod plugin;
pub mod sink;
pub mod transport;

pub use config::Config;
pub use dispatch::{CallHooks, DispatchState, Dispatcher};
pub use domain::{CallEvent, CodeAddr, EntryEvent, ExitEvent, FrameDescriptor};
pub use lifecycle::Agent;
pub use sink::{DiagnosticSink, Sink};
