// Keyscan Core - optical piano key detection and MIDI export
// Frame-driven key sampling, debouncing and Standard MIDI File encoding

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod midi;
pub mod telemetry;
pub mod video;

// Re-exports for convenience
pub use analysis::{KeyDescriptor, Rgb};
pub use config::AppConfig;
pub use engine::{DetectionOptions, FrameDriver, FrameSource, VideoFrame};
pub use error::{DetectionError, ErrorCode, ExportError};
pub use midi::{MidiFileBuilder, NoteEvent};
