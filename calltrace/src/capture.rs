//! Bounded stack capture
//!
//! Thin adapter over the `backtrace` unwinder: walks the current call
//! stack, resolves each return address to a demangled symbol name when one
//! is available, and yields at most [`MAX_STACK_FRAMES`] descriptors.

use crate::domain::{CodeAddr, FrameDescriptor};

/// Upper bound on return addresses sampled per entry event.
pub const MAX_STACK_FRAMES: usize = 30;

/// Capture up to [`MAX_STACK_FRAMES`] frames of the current call stack,
/// outermost frame last, discarding the frame belonging to this routine
/// itself.
#[must_use]
pub fn capture_frames() -> Vec<FrameDescriptor> {
    let mut frames = Vec::new();
    let mut own_frame_skipped = false;

    backtrace::trace(|frame| {
        if !own_frame_skipped {
            own_frame_skipped = true;
            return true;
        }

        let addr = CodeAddr(frame.ip() as usize);
        let mut symbol = None;
        backtrace::resolve_frame(frame, |resolved| {
            if symbol.is_none() {
                symbol = resolved.name().map(|name| name.to_string());
            }
        });

        frames.push(FrameDescriptor::new(addr, symbol));
        frames.len() < MAX_STACK_FRAMES
    });

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_bounded() {
        let frames = capture_frames();
        assert!(!frames.is_empty(), "a test harness stack should have frames");
        assert!(frames.len() <= MAX_STACK_FRAMES);
    }

    #[test]
    fn test_capture_excludes_own_frame() {
        // The first descriptor belongs to this test (or the harness),
        // never to capture_frames itself.
        let frames = capture_frames();
        if let Some(symbol) = frames[0].symbol() {
            assert!(
                !symbol.contains("capture_frames"),
                "capture routine leaked into its own sample: {symbol}"
            );
        }
    }
}
