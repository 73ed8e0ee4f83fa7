// MIDI export error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Export error code constants
///
/// Error code range: 2001-2003
pub struct ExportErrorCodes {}

impl ExportErrorCodes {
    /// Writing the MIDI file failed
    pub const WRITE_FAILED: i32 = 2001;

    /// Bytes handed to the inspector are not a valid format 0 file
    pub const MALFORMED_FILE: i32 = 2002;

    /// A value does not fit the MIDI field it is written to
    pub const VALUE_OUT_OF_RANGE: i32 = 2003;
}

/// Log an export error with structured context
pub fn log_export_error(err: &ExportError, context: &str) {
    error!(
        "Export error in {}: code={}, component=MidiFileBuilder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// MIDI export and inspection errors
#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    /// File system write failed
    WriteFailed { details: String },

    /// Inspected bytes are not a valid single-track file
    MalformedFile { offset: usize, reason: String },

    /// Value cannot be represented in its MIDI field
    ValueOutOfRange { field: &'static str, value: u64 },
}

impl ErrorCode for ExportError {
    fn code(&self) -> i32 {
        match self {
            ExportError::WriteFailed { .. } => ExportErrorCodes::WRITE_FAILED,
            ExportError::MalformedFile { .. } => ExportErrorCodes::MALFORMED_FILE,
            ExportError::ValueOutOfRange { .. } => ExportErrorCodes::VALUE_OUT_OF_RANGE,
        }
    }

    fn message(&self) -> String {
        match self {
            ExportError::WriteFailed { details } => {
                format!("Failed to write MIDI file: {}", details)
            }
            ExportError::MalformedFile { offset, reason } => {
                format!("Malformed MIDI data at byte {}: {}", offset, reason)
            }
            ExportError::ValueOutOfRange { field, value } => {
                format!("Value {} out of range for {}", value, field)
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::WriteFailed {
            details: err.to_string(),
        }
    }
}
