// Analysis module - per-frame key detection
//
// This module holds the detection stages the frame driver runs for every
// key on every frame.
//
// Pipeline:
// - KeySampler: median color in a window around the key on the detection row
// - ColorMatcher: channel-averaged distance to the detection color
// - NoteDebouncer: consecutive-match runs turned into note events
//
// `layout` supplies the key positions the sampler reads.

pub mod color;
pub mod debounce;
pub mod layout;
pub mod sampler;

pub use color::{ColorMatcher, Rgb};
pub use debounce::{DebounceSettings, NoteDebouncer, RunPhase};
pub use layout::{
    filter_pitch_classes, generate_piano_layout, keyboard_for_frame, note_name, place_layout,
    KeyDescriptor,
};
pub use sampler::{median_color, KeyReading, KeySampler, RGBA_STRIDE};
