//! Fan-out of call events across the configured sinks
//!
//! Two states per event: no sink notified yet, at least one notified.
//! The plugin sink runs first (in-process, cheap), then the relay sink
//! (socket boundary, slower). Only when neither is configured does the
//! diagnostic fallback print the event.

use crate::domain::{CallEvent, EntryEvent, ExitEvent};
use crate::sink::{DiagnosticSink, Sink};

/// The upstream event source interface: compiler-inserted hooks deliver a
/// `(function_addr, call_site_addr)` pair through these for every call and
/// return in the instrumented program.
pub trait CallHooks {
    fn on_function_entry(&mut self, function: usize, call_site: usize);
    fn on_function_exit(&mut self, function: usize, call_site: usize);
}

/// The sinks configured at startup.
///
/// Either slot may be absent; a present slot is always fully initialized,
/// because every setup path rolls back partial failures before the slot is
/// filled. Written once at startup, read-only during dispatch.
#[derive(Default)]
pub struct DispatchState {
    pub plugin_sink: Option<Box<dyn Sink + Send>>,
    pub relay_sink: Option<Box<dyn Sink + Send>>,
}

impl DispatchState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugin_sink.is_none() && self.relay_sink.is_none()
    }

    /// Release the sinks in reverse order of acquisition (relay first,
    /// plugin second).
    pub(crate) fn teardown(&mut self) {
        self.relay_sink = None;
        self.plugin_sink = None;
    }
}

/// Per-event fan-out over a [`DispatchState`] plus the diagnostic
/// fallback.
pub struct Dispatcher {
    state: DispatchState,
    diagnostic: DiagnosticSink,
}

impl Dispatcher {
    #[must_use]
    pub fn new(state: DispatchState) -> Self {
        Self::with_diagnostic(state, DiagnosticSink::stderr())
    }

    #[must_use]
    pub fn with_diagnostic(state: DispatchState, diagnostic: DiagnosticSink) -> Self {
        Self { state, diagnostic }
    }

    #[must_use]
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn dispatch(&mut self, event: &CallEvent) {
        match event {
            CallEvent::Entry(entry) => self.dispatch_entry(entry),
            CallEvent::Exit(exit) => self.dispatch_exit(exit),
        }
    }

    pub(crate) fn shutdown(&mut self) {
        self.state.teardown();
    }

    fn dispatch_entry(&mut self, event: &EntryEvent) {
        let mut notified = false;
        if let Some(sink) = self.state.plugin_sink.as_mut() {
            sink.notify_entry(event);
            notified = true;
        }
        if let Some(sink) = self.state.relay_sink.as_mut() {
            sink.notify_entry(event);
            notified = true;
        }
        if !notified {
            self.diagnostic.notify_entry(event);
        }
    }

    fn dispatch_exit(&mut self, event: &ExitEvent) {
        let mut notified = false;
        if let Some(sink) = self.state.plugin_sink.as_mut() {
            sink.notify_exit(event);
            notified = true;
        }
        if let Some(sink) = self.state.relay_sink.as_mut() {
            sink.notify_exit(event);
            notified = true;
        }
        if !notified {
            self.diagnostic.notify_exit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeAddr, FrameDescriptor};
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct RecordingSink {
        label: &'static str,
        log: CallLog,
    }

    impl Sink for RecordingSink {
        fn notify_entry(&mut self, event: &EntryEvent) {
            self.log.lock().unwrap().push(format!("{} entry {}", self.label, event.function));
        }

        fn notify_exit(&mut self, event: &ExitEvent) {
            self.log.lock().unwrap().push(format!("{} exit {}", self.label, event.function));
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn entry_event() -> CallEvent {
        CallEvent::Entry(EntryEvent {
            function: CodeAddr(0x1000),
            call_site: CodeAddr(0x2000),
            frames: vec![FrameDescriptor::new(CodeAddr(0xa), Some("f1".to_string()))],
        })
    }

    fn exit_event() -> CallEvent {
        CallEvent::Exit(ExitEvent { function: CodeAddr(0x1000), call_site: CodeAddr(0x2000) })
    }

    #[test]
    fn test_plugin_runs_strictly_before_relay() {
        let log: CallLog = CallLog::default();
        let state = DispatchState {
            plugin_sink: Some(Box::new(RecordingSink { label: "plugin", log: Arc::clone(&log) })),
            relay_sink: Some(Box::new(RecordingSink { label: "relay", log: Arc::clone(&log) })),
        };
        let mut dispatcher = Dispatcher::new(state);

        dispatcher.dispatch(&entry_event());
        dispatcher.dispatch(&exit_event());

        let calls = log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "plugin entry 0x1000",
                "relay entry 0x1000",
                "plugin exit 0x1000",
                "relay exit 0x1000",
            ]
        );
    }

    #[test]
    fn test_configured_sink_suppresses_fallback() {
        let log: CallLog = CallLog::default();
        let buf = SharedBuf::default();
        let state = DispatchState {
            plugin_sink: Some(Box::new(RecordingSink { label: "plugin", log: Arc::clone(&log) })),
            relay_sink: None,
        };
        let mut dispatcher =
            Dispatcher::with_diagnostic(state, DiagnosticSink::with_writer(Box::new(buf.clone())));

        dispatcher.dispatch(&entry_event());

        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(buf.contents().is_empty(), "fallback must stay silent");
    }

    #[test]
    fn test_fallback_prints_exactly_one_group_per_event() {
        let buf = SharedBuf::default();
        let mut dispatcher = Dispatcher::with_diagnostic(
            DispatchState::default(),
            DiagnosticSink::with_writer(Box::new(buf.clone())),
        );

        dispatcher.dispatch(&entry_event());
        dispatcher.dispatch(&exit_event());

        let out = buf.contents();
        assert_eq!(out.matches("Function ENTRY").count(), 1);
        assert_eq!(out.matches("Function EXIT").count(), 1);
        assert!(out.contains("  Stack frame 0: 0xa (f1)"));
    }

    #[test]
    fn test_teardown_drops_relay_before_plugin() {
        struct DropOrder {
            label: &'static str,
            log: CallLog,
        }

        impl Sink for DropOrder {
            fn notify_entry(&mut self, _: &EntryEvent) {}
            fn notify_exit(&mut self, _: &ExitEvent) {}
        }

        impl Drop for DropOrder {
            fn drop(&mut self) {
                self.log.lock().unwrap().push(self.label.to_string());
            }
        }

        let log: CallLog = CallLog::default();
        let mut state = DispatchState {
            plugin_sink: Some(Box::new(DropOrder { label: "plugin", log: Arc::clone(&log) })),
            relay_sink: Some(Box::new(DropOrder { label: "relay", log: Arc::clone(&log) })),
        };

        state.teardown();
        assert_eq!(*log.lock().unwrap(), vec!["relay", "plugin"]);
    }
}
