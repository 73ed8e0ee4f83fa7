// Detection error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Error code range: 1001-1008
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// An option value is outside its valid range
    pub const INVALID_OPTION: i32 = 1001;

    /// No keys were supplied to the frame driver
    pub const NO_KEYS: i32 = 1002;

    /// Frame pixel buffer does not match its declared geometry
    pub const FRAME_SIZE_MISMATCH: i32 = 1003;

    /// Frame source could not be read
    pub const SOURCE_READ_FAILED: i32 = 1004;

    /// Frame source ended in the middle of a frame
    pub const TRUNCATED_FRAME: i32 = 1005;

    /// Frame delivered after the session was stopped
    pub const SESSION_STOPPED: i32 = 1006;

    /// Shared options lock was poisoned
    pub const LOCK_POISONED: i32 = 1007;

    /// Frame source geometry is unusable
    pub const INVALID_GEOMETRY: i32 = 1008;
}

/// Log a detection error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component=FrameDriver, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Detection-related errors
///
/// These errors cover session construction, frame delivery and frame
/// source I/O. Out-of-bounds sampling and not-ready frames are not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Option value rejected at construction time
    InvalidOption { field: &'static str, reason: String },

    /// The session was created without any keys to sample
    NoKeys,

    /// RGBA buffer length disagrees with width * height * 4
    FrameSizeMismatch { expected: usize, actual: usize },

    /// Underlying frame source failed
    SourceReadFailed { details: String },

    /// Frame source ended after a partial frame
    TruncatedFrame { expected: usize, actual: usize },

    /// Frame processed after stop()
    SessionStopped,

    /// RwLock around the shared options was poisoned
    LockPoisoned { component: String },

    /// Declared frame dimensions cannot be used
    InvalidGeometry { width: u32, height: u32 },
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::InvalidOption { .. } => DetectionErrorCodes::INVALID_OPTION,
            DetectionError::NoKeys => DetectionErrorCodes::NO_KEYS,
            DetectionError::FrameSizeMismatch { .. } => DetectionErrorCodes::FRAME_SIZE_MISMATCH,
            DetectionError::SourceReadFailed { .. } => DetectionErrorCodes::SOURCE_READ_FAILED,
            DetectionError::TruncatedFrame { .. } => DetectionErrorCodes::TRUNCATED_FRAME,
            DetectionError::SessionStopped => DetectionErrorCodes::SESSION_STOPPED,
            DetectionError::LockPoisoned { .. } => DetectionErrorCodes::LOCK_POISONED,
            DetectionError::InvalidGeometry { .. } => DetectionErrorCodes::INVALID_GEOMETRY,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::InvalidOption { field, reason } => {
                format!("Invalid option '{}': {}", field, reason)
            }
            DetectionError::NoKeys => "No keys configured for detection".to_string(),
            DetectionError::FrameSizeMismatch { expected, actual } => {
                format!(
                    "Frame buffer holds {} bytes, expected {}",
                    actual, expected
                )
            }
            DetectionError::SourceReadFailed { details } => {
                format!("Failed to read frame source: {}", details)
            }
            DetectionError::TruncatedFrame { expected, actual } => {
                format!(
                    "Frame source ended mid-frame ({} of {} bytes)",
                    actual, expected
                )
            }
            DetectionError::SessionStopped => {
                "Detection session already stopped. Start a new session.".to_string()
            }
            DetectionError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            DetectionError::InvalidGeometry { width, height } => {
                format!("Invalid frame geometry {}x{}", width, height)
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectionError {}

impl From<std::io::Error> for DetectionError {
    fn from(err: std::io::Error) -> Self {
        DetectionError::SourceReadFailed {
            details: err.to_string(),
        }
    }
}
