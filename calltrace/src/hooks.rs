//! C-ABI adapter for compiler-inserted instrumentation hooks
//!
//! Exports the symbols GCC's `-finstrument-functions` contract expects:
//! `__cyg_profile_func_enter` / `__cyg_profile_func_exit`, plus the
//! constructor/destructor pair an instrumented program (or an
//! `.init_array` entry) runs around `main`. The hooks forward to the
//! process-wide [`Agent`] through its [`CallHooks`] implementation.
//!
//! Hooks never block and never unwind across the FFI boundary: the agent
//! slot is taken with `try_lock`, so a re-entrant call (a plugin invoking
//! an instrumented function) skips the event instead of deadlocking.

// Exported #[no_mangle] symbols and C pointer arguments.
#![allow(unsafe_code)]

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use crate::config::Config;
use crate::dispatch::CallHooks;
use crate::lifecycle::Agent;

static AGENT: Mutex<Option<Agent>> = Mutex::new(None);

/// Arm the agent from the process environment. Idempotent enough for a
/// constructor: a second call replaces (and tears down) the previous
/// agent.
#[no_mangle]
pub extern "C" fn instrument_constructor() {
    let _ = catch_unwind(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("warn"),
        )
        .try_init();

        let agent = Agent::start(&Config::from_env());
        if let Ok(mut slot) = AGENT.try_lock() {
            *slot = Some(agent);
        }
    });
}

/// Tear the agent down; dropping it releases the relay channel and the
/// plugin library. Safe to call without a prior constructor.
#[no_mangle]
pub extern "C" fn instrument_destructor() {
    let _ = catch_unwind(|| {
        if let Ok(mut slot) = AGENT.try_lock() {
            slot.take();
        }
    });
}

#[no_mangle]
pub extern "C" fn __cyg_profile_func_enter(func: *mut c_void, call_site: *mut c_void) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if let Ok(mut slot) = AGENT.try_lock() {
            if let Some(agent) = slot.as_mut() {
                agent.on_function_entry(func as usize, call_site as usize);
            }
        }
    }));
}

#[no_mangle]
pub extern "C" fn __cyg_profile_func_exit(func: *mut c_void, call_site: *mut c_void) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if let Ok(mut slot) = AGENT.try_lock() {
            if let Some(agent) = slot.as_mut() {
                agent.on_function_exit(func as usize, call_site as usize);
            }
        }
    }));
}
