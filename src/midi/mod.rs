//! Standard MIDI File export.
//!
//! - `vlq`: variable-length quantity codec for delta-times
//! - `track`: low-level single-track chunk writer
//! - `builder`: note collection and file assembly
//! - `inspect`: read-back for verification and the CLI
//! - `demo`: C-major scale test file

pub mod builder;
pub mod demo;
pub mod inspect;
pub mod track;
pub mod vlq;

pub use builder::{
    MidiFileBuilder, NoteEvent, DEFAULT_BPM, DEFAULT_TICKS_PER_QUARTER, DEFAULT_VELOCITY,
    NOTE_OFF_VELOCITY,
};
pub use demo::build_scale_demo;
pub use inspect::{hex_preview, inspect, InspectedNote, MidiSummary};
