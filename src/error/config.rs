// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 1001-1008
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A local window or block size is zero
    pub const ZERO_SIZE: i32 = 1001;

    /// Local window size is not an exact multiple of the block size
    pub const NOT_DIVISIBLE: i32 = 1002;

    /// A sampling step is zero
    pub const ZERO_STEP: i32 = 1003;

    /// No scales configured
    pub const EMPTY_SCALES: i32 = 1004;

    /// Scale factor is not finite and positive
    pub const INVALID_SCALE: i32 = 1005;

    /// Ratio (bootstrap, discretization) outside its valid range
    pub const INVALID_RATIO: i32 = 1006;

    /// Numeric parameter outside its valid range
    pub const INVALID_PARAMETER: i32 = 1007;

    /// Spatio-temporal volume with empty extent
    pub const DEGENERATE_VOLUME: i32 = 1008;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration errors
///
/// Reported when a component is constructed; none of them is recoverable
/// by retrying with the same parameters.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A local window or block size is zero
    ZeroSize { parameter: String },

    /// Local size is not a multiple of the block size (after odd-forcing)
    NotDivisible {
        axis: char,
        local_size: usize,
        block_size: usize,
    },

    /// A sampling step is zero
    ZeroStep { axis: char },

    /// No scales configured
    EmptyScales,

    /// Scale factor is not finite and positive
    InvalidScale { value: f64 },

    /// Ratio outside its valid range
    InvalidRatio { parameter: String, value: f64 },

    /// Numeric parameter outside its valid range
    InvalidParameter { parameter: String, reason: String },

    /// Spatio-temporal volume with empty extent
    DegenerateVolume { reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::ZeroSize { .. } => ConfigErrorCodes::ZERO_SIZE,
            ConfigError::NotDivisible { .. } => ConfigErrorCodes::NOT_DIVISIBLE,
            ConfigError::ZeroStep { .. } => ConfigErrorCodes::ZERO_STEP,
            ConfigError::EmptyScales => ConfigErrorCodes::EMPTY_SCALES,
            ConfigError::InvalidScale { .. } => ConfigErrorCodes::INVALID_SCALE,
            ConfigError::InvalidRatio { .. } => ConfigErrorCodes::INVALID_RATIO,
            ConfigError::InvalidParameter { .. } => ConfigErrorCodes::INVALID_PARAMETER,
            ConfigError::DegenerateVolume { .. } => ConfigErrorCodes::DEGENERATE_VOLUME,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::ZeroSize { parameter } => format!("{} must be non-zero", parameter),
            ConfigError::NotDivisible {
                axis,
                local_size,
                block_size,
            } => format!(
                "Local size {} on axis {} is not a multiple of block size {}",
                local_size, axis, block_size
            ),
            ConfigError::ZeroStep { axis } => format!("Step on axis {} must be non-zero", axis),
            ConfigError::EmptyScales => "At least one scale is required".to_string(),
            ConfigError::InvalidScale { value } => {
                format!("Scale {} must be finite and positive", value)
            }
            ConfigError::InvalidRatio { parameter, value } => {
                format!("Invalid {}: {}", parameter, value)
            }
            ConfigError::InvalidParameter { parameter, reason } => {
                format!("Invalid {}: {}", parameter, reason)
            }
            ConfigError::DegenerateVolume { reason } => {
                format!("Degenerate volume: {}", reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
