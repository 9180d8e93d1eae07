//! Message framing: one call event → bounded send-ready chunks
//!
//! Each chunk is one line of the relay wire format and never exceeds
//! [`MAX_FIELD_BYTES`]; the chunks of one event together never exceed
//! [`MAX_MESSAGE_BYTES`]. Truncation is accounted for and logged but is
//! never fatal — the header of an entry event always survives.
//!
//! The line-oriented text format is the contract under test; a structured
//! (length-prefixed or self-describing) encoding would slot in here
//! without touching the dispatcher or the transport.

use log::warn;

use crate::domain::{EntryEvent, ExitEvent};

/// Per-field staging budget: one formatted line is clipped to this size.
pub const MAX_FIELD_BYTES: usize = 256;

/// Per-event wire budget across all chunks, the practical datagram
/// ceiling of the relay transport.
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// One event, framed: ordered chunks plus truncation accounting.
#[derive(Debug, Default)]
pub struct FramedEvent {
    /// Send-ready chunks, header first. Emitted in order; a failed send
    /// drops the rest of the event, never the pipeline.
    pub chunks: Vec<String>,
    /// Fields clipped to [`MAX_FIELD_BYTES`].
    pub truncated_fields: usize,
    /// Stack frames dropped because the message budget ran out.
    pub dropped_frames: usize,
}

impl FramedEvent {
    /// Whether any content was lost while framing.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated_fields > 0 || self.dropped_frames > 0
    }
}

/// Frame an entry event: a header chunk followed by one chunk per stack
/// frame, as far as the message budget allows.
#[must_use]
pub fn frame_entry(event: &EntryEvent) -> FramedEvent {
    let mut framed = FramedEvent::default();

    let header = clip_field(
        format!(
            "Function ENTRY {} from {} [stack frames sampled {}]\n",
            event.function,
            event.call_site,
            event.frames.len()
        ),
        &mut framed.truncated_fields,
    );
    // MAX_FIELD_BYTES < MAX_MESSAGE_BYTES, so the header always fits
    let mut budget = MAX_MESSAGE_BYTES - header.len();
    framed.chunks.push(header);

    for (index, frame) in event.frames.iter().enumerate() {
        let line = clip_field(
            format!("  Stack frame {index}: {frame}\n"),
            &mut framed.truncated_fields,
        );
        if line.len() > budget {
            framed.dropped_frames = event.frames.len() - index;
            warn!(
                "message budget exhausted: dropping {} of {} stack frames",
                framed.dropped_frames,
                event.frames.len()
            );
            break;
        }
        budget -= line.len();
        framed.chunks.push(line);
    }

    framed
}

/// Frame an exit event: always a single chunk.
#[must_use]
pub fn frame_exit(event: &ExitEvent) -> FramedEvent {
    let mut framed = FramedEvent::default();
    let line = clip_field(
        format!("Function EXIT {} to {}\n", event.function, event.call_site),
        &mut framed.truncated_fields,
    );
    framed.chunks.push(line);
    framed
}

/// Clip one formatted field to [`MAX_FIELD_BYTES`] at a char boundary,
/// counting and logging the truncation.
fn clip_field(field: String, truncated_fields: &mut usize) -> String {
    if field.len() <= MAX_FIELD_BYTES {
        return field;
    }

    *truncated_fields += 1;
    warn!("field truncated [max {MAX_FIELD_BYTES}: req {}]", field.len());

    let mut clipped = field;
    let mut cut = MAX_FIELD_BYTES;
    while !clipped.is_char_boundary(cut) {
        cut -= 1;
    }
    clipped.truncate(cut);
    clipped
}
