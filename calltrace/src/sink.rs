//! The notification sink abstraction and the diagnostic fallback
//!
//! A sink is a destination for entry/exit notifications. Implementations
//! must never panic and never propagate a failure to the caller: delivery
//! is fire-and-forget, failures are logged and swallowed.

use std::fmt::Write as _;
use std::io::{self, Write};

use log::warn;

use crate::domain::{EntryEvent, ExitEvent};

/// A destination capable of receiving entry/exit notifications.
pub trait Sink {
    fn notify_entry(&mut self, event: &EntryEvent);
    fn notify_exit(&mut self, event: &ExitEvent);
}

/// The always-available fallback sink: prints events to the diagnostic
/// stream (stderr by default, any writer in tests).
///
/// Each event becomes a single write so a line group is never interleaved
/// with other diagnostic output.
pub struct DiagnosticSink {
    out: Box<dyn Write + Send>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn stderr() -> Self {
        Self { out: Box::new(io::stderr()) }
    }

    /// Route output to an arbitrary writer.
    #[must_use]
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            warn!("diagnostic sink write failed: {err}");
        }
    }
}

impl Sink for DiagnosticSink {
    fn notify_entry(&mut self, event: &EntryEvent) {
        let mut text = format!(
            "Function ENTRY {} from {} [stack frames sampled {}]\n",
            event.function,
            event.call_site,
            event.frames.len()
        );
        for (index, frame) in event.frames.iter().enumerate() {
            let _ = writeln!(text, "  Stack frame {index}: {frame}");
        }
        self.emit(&text);
    }

    fn notify_exit(&mut self, event: &ExitEvent) {
        self.emit(&format!("Function EXIT {} to {}\n", event.function, event.call_site));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeAddr, FrameDescriptor};
    use std::sync::{Arc, Mutex};

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

    #[test]
    fn test_entry_prints_header_and_frames_in_one_group() {
        let buf = SharedBuf::default();
        let mut sink = DiagnosticSink::with_writer(Box::new(buf.clone()));

        sink.notify_entry(&EntryEvent {
            function: CodeAddr(0x1000),
            call_site: CodeAddr(0x2000),
            frames: vec![
                FrameDescriptor::new(CodeAddr(0xa), Some("f1".to_string())),
                FrameDescriptor::new(CodeAddr(0xb), Some("f2".to_string())),
            ],
        });

        let out = buf.contents();
        assert!(out.starts_with("Function ENTRY 0x1000 from 0x2000 [stack frames sampled 2]\n"));
        assert!(out.contains("  Stack frame 0: 0xa (f1)\n"));
        assert!(out.contains("  Stack frame 1: 0xb (f2)\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_exit_prints_one_line() {
        let buf = SharedBuf::default();
        let mut sink = DiagnosticSink::with_writer(Box::new(buf.clone()));

        sink.notify_exit(&ExitEvent { function: CodeAddr(0x1000), call_site: CodeAddr(0x2000) });

        assert_eq!(buf.contents(), "Function EXIT 0x1000 to 0x2000\n");
    }
}
