// Forest training error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Training error code constants
///
/// Error code range: 2001-2006
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    /// No training samples were supplied
    pub const EMPTY_TRAINING_SET: i32 = 2001;

    /// Bootstrap ratio produced an empty sample for a tree
    pub const EMPTY_BOOTSTRAP: i32 = 2002;

    /// A sample carries a label outside `[0, n_classes)`
    pub const LABEL_OUT_OF_RANGE: i32 = 2003;

    /// A configured class has no samples at all
    pub const EMPTY_CLASS: i32 = 2004;

    /// Samples disagree on descriptor shape
    pub const DESCRIPTOR_MISMATCH: i32 = 2005;

    /// Forest configuration failed validation
    pub const INVALID_CONFIG: i32 = 2006;
}

/// Log a training error with structured context
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=DecisionForest, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Degenerate training data and training-time configuration errors
///
/// Error code range: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// No training samples were supplied
    EmptyTrainingSet,

    /// Bootstrap ratio produced an empty sample
    EmptyBootstrap { ratio: f64, n_samples: usize },

    /// A sample label is outside `[0, n_classes)`
    LabelOutOfRange { label: usize, n_classes: usize },

    /// A configured class has no samples
    EmptyClass { label: usize },

    /// Samples disagree on channel count or channel length
    DescriptorMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Forest configuration failed validation
    InvalidConfig { reason: String },
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::EmptyTrainingSet => TrainingErrorCodes::EMPTY_TRAINING_SET,
            TrainingError::EmptyBootstrap { .. } => TrainingErrorCodes::EMPTY_BOOTSTRAP,
            TrainingError::LabelOutOfRange { .. } => TrainingErrorCodes::LABEL_OUT_OF_RANGE,
            TrainingError::EmptyClass { .. } => TrainingErrorCodes::EMPTY_CLASS,
            TrainingError::DescriptorMismatch { .. } => TrainingErrorCodes::DESCRIPTOR_MISMATCH,
            TrainingError::InvalidConfig { .. } => TrainingErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::EmptyTrainingSet => "Training set is empty".to_string(),
            TrainingError::EmptyBootstrap { ratio, n_samples } => format!(
                "Bootstrap ratio {} over {} samples yields no samples",
                ratio, n_samples
            ),
            TrainingError::LabelOutOfRange { label, n_classes } => {
                format!("Label {} out of range for {} classes", label, n_classes)
            }
            TrainingError::EmptyClass { label } => format!("Class {} has no samples", label),
            TrainingError::DescriptorMismatch { expected, found } => format!(
                "Descriptor shape mismatch: expected {} channels x {}, found {} x {}",
                expected.0, expected.1, found.0, found.1
            ),
            TrainingError::InvalidConfig { reason } => {
                format!("Invalid forest configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {}

impl From<crate::error::ConfigError> for TrainingError {
    fn from(err: crate::error::ConfigError) -> Self {
        TrainingError::InvalidConfig {
            reason: err.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_error_codes() {
        assert_eq!(
            TrainingError::EmptyTrainingSet.code(),
            TrainingErrorCodes::EMPTY_TRAINING_SET
        );
        assert_eq!(
            TrainingError::EmptyBootstrap {
                ratio: 0.0,
                n_samples: 10
            }
            .code(),
            TrainingErrorCodes::EMPTY_BOOTSTRAP
        );
        assert_eq!(
            TrainingError::EmptyClass { label: 2 }.code(),
            TrainingErrorCodes::EMPTY_CLASS
        );
    }

    #[test]
    fn test_training_error_messages() {
        let err = TrainingError::LabelOutOfRange {
            label: 7,
            n_classes: 3,
        };
        assert_eq!(err.message(), "Label 7 out of range for 3 classes");

        let err = TrainingError::DescriptorMismatch {
            expected: (4, 27),
            found: (4, 9),
        };
        assert!(err.message().contains("expected 4 channels x 27"));
    }
}
