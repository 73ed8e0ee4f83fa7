//! Session event types reported by the frame driver to the CLI and any
//! embedding host.

use serde::{Deserialize, Serialize};

/// Why a frame was not sampled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Frame arrived before its dimensions were known
    NotReady,
    /// Pixel buffer did not match the frame's declared dimensions
    SizeMismatch,
}

/// Notable moments of a detection session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        key_count: usize,
    },
    GeometryChanged {
        width: u32,
        height: u32,
    },
    FrameSkipped {
        timestamp_seconds: f64,
        reason: SkipReason,
    },
    OptionsRejected {
        reason: String,
    },
    NoteEmitted {
        note: String,
        midi_number: u8,
        start_seconds: f64,
        duration_seconds: f64,
    },
    NotesFlushed {
        count: usize,
        timestamp_seconds: f64,
    },
    SessionStopped {
        frames_processed: u64,
        note_count: usize,
    },
}
