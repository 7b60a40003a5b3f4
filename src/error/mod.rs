// Error types for the action detection core
//
// This module defines custom error types for configuration, forest training,
// persistence, frame sources and detection, providing structured error handling with
// numeric error codes for callers that need to branch on the failure kind.

mod config;
mod detection;
mod frame_source;
mod persistence;
mod training;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};
pub use frame_source::{log_frame_source_error, FrameSourceError, FrameSourceErrorCodes};
pub use persistence::{log_persistence_error, PersistenceError, PersistenceErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and its binaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
