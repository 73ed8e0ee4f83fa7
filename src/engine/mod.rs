//! Engine module housing the frame-drive loop.
//!
//! `options` holds the detection parameters shared with the host, `source`
//! abstracts frame delivery, and `core` runs the per-frame detection and
//! owns the session's MIDI builder.

pub mod core;
pub mod options;
pub mod source;

pub use self::core::{FrameDriver, FrameOutcome, SessionState, SessionSummary};
pub use options::{DetectionOptions, DetectionRow, OptionsPatch, SharedOptions};
pub use source::{FrameSource, VecFrameSource, VideoFrame};
