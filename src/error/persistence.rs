// Forest persistence error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Persistence error code constants
///
/// Error code range: 3001-3003
pub struct PersistenceErrorCodes {}

impl PersistenceErrorCodes {
    /// Reading or writing the underlying file failed
    pub const IO: i32 = 3001;

    /// JSON encoding or decoding failed
    pub const SERIALIZATION: i32 = 3002;

    /// Decoded forest violates a structural invariant
    pub const INVALID_STRUCTURE: i32 = 3003;
}

/// Log a persistence error with structured context
pub fn log_persistence_error(err: &PersistenceError, context: &str) {
    error!(
        "Persistence error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while saving or loading a trained forest
///
/// Error code range: 3001-3003
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// File system failure
    Io { reason: String },

    /// JSON encoding or decoding failure
    Serialization { reason: String },

    /// Structurally invalid forest (dangling child, leaf index out of range, ...)
    InvalidStructure { reason: String },
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> i32 {
        match self {
            PersistenceError::Io { .. } => PersistenceErrorCodes::IO,
            PersistenceError::Serialization { .. } => PersistenceErrorCodes::SERIALIZATION,
            PersistenceError::InvalidStructure { .. } => PersistenceErrorCodes::INVALID_STRUCTURE,
        }
    }

    fn message(&self) -> String {
        match self {
            PersistenceError::Io { reason } => format!("I/O failure: {}", reason),
            PersistenceError::Serialization { reason } => {
                format!("Serialization failure: {}", reason)
            }
            PersistenceError::InvalidStructure { reason } => {
                format!("Invalid forest structure: {}", reason)
            }
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PersistenceError {}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing forest");
        let err: PersistenceError = io.into();
        assert_eq!(err.code(), PersistenceErrorCodes::IO);
        assert!(err.message().contains("missing forest"));
    }

    #[test]
    fn test_persistence_error_from_json() {
        let json_err = serde_json::from_str::<Vec<u32>>("{not json").unwrap_err();
        let err: PersistenceError = json_err.into();
        assert_eq!(err.code(), PersistenceErrorCodes::SERIALIZATION);
    }
}
