// Detection error types and constants

use crate::error::{ConfigError, ErrorCode, FrameSourceError};
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Error code range: 5001-5003
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// Detector could not be built from the forest and configuration
    pub const CONFIG: i32 = 5001;

    /// Frame source failed while the detector was running
    pub const FRAME_SOURCE: i32 = 5002;

    /// Forest was trained on descriptors of another shape
    pub const FOREST_MISMATCH: i32 = 5003;
}

/// Log a detection error with structured context
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while running a detector over a stream
///
/// Error code range: 5001-5003
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    Config(ConfigError),

    FrameSource(FrameSourceError),

    /// Descriptor shape of the extractor differs from the forest's
    ForestMismatch {
        forest: (usize, usize),
        extractor: (usize, usize),
    },
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::Config(_) => DetectionErrorCodes::CONFIG,
            DetectionError::FrameSource(_) => DetectionErrorCodes::FRAME_SOURCE,
            DetectionError::ForestMismatch { .. } => DetectionErrorCodes::FOREST_MISMATCH,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::Config(err) => format!("Invalid configuration: {}", err.message()),
            DetectionError::FrameSource(err) => format!("Frame source failed: {}", err.message()),
            DetectionError::ForestMismatch { forest, extractor } => format!(
                "Forest expects {}x{} descriptors, extractor produces {}x{}",
                forest.0, forest.1, extractor.0, extractor.1
            ),
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

impl From<ConfigError> for DetectionError {
    fn from(err: ConfigError) -> Self {
        DetectionError::Config(err)
    }
}

impl From<FrameSourceError> for DetectionError {
    fn from(err: FrameSourceError) -> Self {
        DetectionError::FrameSource(err)
    }
}
