// Error types for the keyscan detection core
//
// This module defines custom error types for frame detection and MIDI export,
// providing structured error handling with numeric error codes that the CLI
// and any embedding host can report consistently.

mod detection;
mod export;

pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};
pub use export::{log_export_error, ExportError, ExportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// library and CLI boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
