//! Process-wide agent lifecycle
//!
//! One-time setup at process start, steady-state gating of every event,
//! idempotent teardown at process end. `start` never leaves a partially
//! configured sink reachable: each sink's setup either completes fully or
//! rolls back to "absent".

use log::{info, warn};

use crate::capture::capture_frames;
use crate::config::Config;
use crate::dispatch::{CallHooks, DispatchState, Dispatcher};
use crate::domain::{CallEvent, CodeAddr, EntryEvent, ExitEvent};
use crate::plugin::load_plugin;
use crate::sink::{DiagnosticSink, Sink};
use crate::transport::RelaySink;

/// The tracing agent: the enable gate plus ownership of every configured
/// sink. Dropping the agent runs [`Agent::stop`].
pub struct Agent {
    enabled: bool,
    dispatcher: Option<Dispatcher>,
}

impl Agent {
    /// Build the agent from an immutable configuration.
    ///
    /// Disabled configurations produce an inert agent: no sink is
    /// constructed, no resource acquired, and every later event is a true
    /// no-op. When enabled, plugin and relay setup run independently —
    /// either, both or neither may succeed; each failure degrades that
    /// sink to absent.
    #[must_use]
    pub fn start(config: &Config) -> Self {
        Self::start_with_diagnostic(config, DiagnosticSink::stderr())
    }

    /// Like [`Agent::start`] with the diagnostic output routed to an
    /// arbitrary writer.
    #[must_use]
    pub fn start_with_diagnostic(config: &Config, diagnostic: DiagnosticSink) -> Self {
        if !config.enabled {
            return Self { enabled: false, dispatcher: None };
        }
        info!("call tracing armed");

        let mut state = DispatchState::default();
        if let Some(path) = &config.plugin_path {
            state.plugin_sink =
                load_plugin(path).map(|sink| Box::new(sink) as Box<dyn Sink + Send>);
        }
        if let Some(peer) = &config.relay_peer {
            state.relay_sink = match RelaySink::connect(peer, config.accept_remote_commands) {
                Ok(sink) => Some(Box::new(sink) as Box<dyn Sink + Send>),
                Err(err) => {
                    warn!("{err}");
                    None
                }
            };
        }

        Self { enabled: true, dispatcher: Some(Dispatcher::with_diagnostic(state, diagnostic)) }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether any sink beyond the diagnostic fallback is configured.
    #[must_use]
    pub fn has_configured_sink(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(|dispatcher| !dispatcher.state().is_empty())
    }

    /// Release everything acquired by `start`, in reverse order of
    /// acquisition (relay channel before plugin library). Safe to call
    /// repeatedly; every call after the first is a no-op.
    pub fn stop(&mut self) {
        if let Some(mut dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
            info!("call tracing stopped");
        }
        self.enabled = false;
    }
}

impl CallHooks for Agent {
    fn on_function_entry(&mut self, function: usize, call_site: usize) {
        if !self.enabled {
            return;
        }
        let Some(dispatcher) = self.dispatcher.as_mut() else { return };

        let event = CallEvent::Entry(EntryEvent {
            function: CodeAddr(function),
            call_site: CodeAddr(call_site),
            frames: capture_frames(),
        });
        dispatcher.dispatch(&event);
    }

    fn on_function_exit(&mut self, function: usize, call_site: usize) {
        if !self.enabled {
            return;
        }
        let Some(dispatcher) = self.dispatcher.as_mut() else { return };

        let event = CallEvent::Exit(ExitEvent {
            function: CodeAddr(function),
            call_site: CodeAddr(call_site),
        });
        dispatcher.dispatch(&event);
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop();
    }
}
