// Frame source error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Frame source error code constants
///
/// Error code range: 4001-4004
pub struct FrameSourceErrorCodes {}

impl FrameSourceErrorCodes {
    /// Directory or file could not be read
    pub const IO: i32 = 4001;

    /// Frame file could not be decoded as an image
    pub const DECODE: i32 = 4002;

    /// Frame dimensions changed mid-stream
    pub const SIZE_MISMATCH: i32 = 4003;

    /// Frame has zero width or height
    pub const EMPTY_FRAME: i32 = 4004;
}

/// Log a frame source error with structured context
pub fn log_frame_source_error(err: &FrameSourceError, context: &str) {
    error!(
        "Frame source error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while reading frames
///
/// Error code range: 4001-4004
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSourceError {
    /// File system failure
    Io { reason: String },

    /// Image decoding failure
    Decode { path: String, reason: String },

    /// Frame dimensions differ from the first frame
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// Frame with zero width or height
    EmptyFrame,
}

impl ErrorCode for FrameSourceError {
    fn code(&self) -> i32 {
        match self {
            FrameSourceError::Io { .. } => FrameSourceErrorCodes::IO,
            FrameSourceError::Decode { .. } => FrameSourceErrorCodes::DECODE,
            FrameSourceError::SizeMismatch { .. } => FrameSourceErrorCodes::SIZE_MISMATCH,
            FrameSourceError::EmptyFrame => FrameSourceErrorCodes::EMPTY_FRAME,
        }
    }

    fn message(&self) -> String {
        match self {
            FrameSourceError::Io { reason } => format!("I/O failure: {}", reason),
            FrameSourceError::Decode { path, reason } => {
                format!("Failed to decode {}: {}", path, reason)
            }
            FrameSourceError::SizeMismatch { expected, found } => format!(
                "Frame size changed from {}x{} to {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            FrameSourceError::EmptyFrame => "Frame has zero width or height".to_string(),
        }
    }
}

impl fmt::Display for FrameSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrameSourceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FrameSourceError {}

impl From<std::io::Error> for FrameSourceError {
    fn from(err: std::io::Error) -> Self {
        FrameSourceError::Io {
            reason: err.to_string(),
        }
    }
}
