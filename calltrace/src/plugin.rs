//! Dynamic plugin loading with all-or-nothing symbol resolution
//!
//! A plugin is a shared library exporting the two notifier entry points
//! named below. Resolution is transactional: unless both symbols resolve,
//! nothing is kept and the library handle is released — a half-bound
//! plugin is never observable.

// Loading a shared object and calling through its symbols is FFI.
#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_void, CString};
use std::path::Path;

use log::{info, warn};

use crate::domain::{EntryEvent, ExitEvent, PluginError};
use crate::sink::Sink;

/// Symbol a plugin must export to receive entry notifications.
pub const NOTIFY_ENTRY_SYMBOL: &str = "receive_notification_entry";

/// Symbol a plugin must export to receive exit notifications.
pub const NOTIFY_EXIT_SYMBOL: &str = "receive_notification_exit";

/// Plugin ABI, entry side: function address, call-site address, frame
/// count, frame descriptor strings.
pub type EntryNotifier =
    unsafe extern "C" fn(*const c_void, *const c_void, c_int, *const *const c_char);

/// Plugin ABI, exit side: function address, call-site address.
pub type ExitNotifier = unsafe extern "C" fn(*const c_void, *const c_void);

/// A loaded library that can resolve the two notifier entry points.
///
/// Production uses [`SharedObject`]; tests substitute a counting double to
/// verify the rollback contract. Dropping an implementation releases the
/// underlying library and every symbol resolved from it.
pub trait NotifierLibrary {
    fn entry_notifier(&self) -> Result<EntryNotifier, PluginError>;
    fn exit_notifier(&self) -> Result<ExitNotifier, PluginError>;
}

/// A dlopen-backed notifier library.
pub struct SharedObject {
    library: libloading::Library,
}

impl SharedObject {
    pub fn open(path: &Path) -> Result<Self, PluginError> {
        // SAFETY: library constructors run during load. Loading an
        // operator-supplied plugin is the documented trust boundary.
        let library = unsafe { libloading::Library::new(path) }.map_err(|err| {
            PluginError::LibraryOpen { path: path.to_path_buf(), detail: err.to_string() }
        })?;
        Ok(Self { library })
    }

    fn resolve<T: Copy + 'static>(&self, name: &'static str) -> Result<T, PluginError> {
        // SAFETY: the signature is fixed by the plugin ABI; a plugin
        // exporting the name with another signature is undetectable here,
        // exactly as with dlsym.
        unsafe {
            self.library
                .get::<T>(name.as_bytes())
                .map(|symbol| *symbol)
                .map_err(|err| PluginError::SymbolMissing { name, detail: err.to_string() })
        }
    }
}

impl NotifierLibrary for SharedObject {
    fn entry_notifier(&self) -> Result<EntryNotifier, PluginError> {
        self.resolve(NOTIFY_ENTRY_SYMBOL)
    }

    fn exit_notifier(&self) -> Result<ExitNotifier, PluginError> {
        self.resolve(NOTIFY_EXIT_SYMBOL)
    }
}

/// Both notifiers plus the library that owns their lifetime.
pub(crate) struct NotifierBundle<L> {
    pub(crate) entry: EntryNotifier,
    pub(crate) exit: ExitNotifier,
    // Must outlive the resolved function pointers.
    #[allow(dead_code)]
    library: L,
}

/// Transactional resolve of both entry points.
///
/// On either failure the library is dropped here — symbols resolved so far
/// are released with it and `None` is returned.
pub(crate) fn bind_notifiers<L: NotifierLibrary>(library: L) -> Option<NotifierBundle<L>> {
    let entry = match library.entry_notifier() {
        Ok(notifier) => notifier,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };
    let exit = match library.exit_notifier() {
        Ok(notifier) => notifier,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };
    Some(NotifierBundle { entry, exit, library })
}

/// The plugin sink: two resolved notifiers called directly in-process.
///
/// Calls are fire-and-forget and unguarded: a plugin that crashes takes
/// the host program with it. That risk is accepted, not handled.
pub struct PluginSink {
    bundle: NotifierBundle<SharedObject>,
}

/// Open `path` and resolve both notifiers, all-or-nothing.
///
/// Returns `None` — with the library handle released — on any failure.
#[must_use]
pub fn load_plugin(path: &Path) -> Option<PluginSink> {
    let library = match SharedObject::open(path) {
        Ok(library) => library,
        Err(err) => {
            warn!("{err}");
            return None;
        }
    };

    let bundle = bind_notifiers(library)?;
    info!("notification plugin loaded from {}", path.display());
    Some(PluginSink { bundle })
}

impl Sink for PluginSink {
    fn notify_entry(&mut self, event: &EntryEvent) {
        let descriptors: Vec<CString> = event
            .frames
            .iter()
            .map(|frame| {
                CString::new(frame.to_string()).unwrap_or_else(|err| {
                    // Interior NUL cannot cross the C boundary; drop it.
                    let mut bytes = err.into_vec();
                    bytes.retain(|byte| *byte != 0);
                    CString::new(bytes).unwrap_or_default()
                })
            })
            .collect();
        let pointers: Vec<*const c_char> =
            descriptors.iter().map(|descriptor| descriptor.as_ptr()).collect();

        // SAFETY: the descriptor strings outlive the call and the count
        // matches the pointer array length.
        unsafe {
            (self.bundle.entry)(
                event.function.as_ptr(),
                event.call_site.as_ptr(),
                c_int::try_from(pointers.len()).unwrap_or(c_int::MAX),
                pointers.as_ptr(),
            );
        }
    }

    fn notify_exit(&mut self, event: &ExitEvent) {
        // SAFETY: both addresses are opaque values the plugin must treat
        // as such; nothing is dereferenced on this side.
        unsafe {
            (self.bundle.exit)(event.function.as_ptr(), event.call_site.as_ptr());
        }
    }
}
