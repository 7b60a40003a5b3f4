//! Configuration management for extraction, training and voting
//!
//! This module provides runtime configuration loading from JSON files,
//! so window sizes, forest parameters and voting-space bounds can be
//! adjusted without recompilation. Each component validates its own
//! section when it is constructed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{log_config_error, ConfigError};
use crate::features::{Channel, PoolingType};
use crate::forest::CriterionKind;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extractor: ExtractorConfig,
    pub forest: ForestConfig,
    pub voting: VotingConfig,
    pub pipeline: PipelineConfig,
}

/// Streaming feature extractor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Resize factors relative to the input frame; 1.0 is the base scale
    pub scales: Vec<f64>,
    /// Local window width in pixels (forced odd)
    pub local_width: usize,
    /// Local window height in pixels (forced odd)
    pub local_height: usize,
    /// Local window duration in frames (forced odd)
    pub local_duration: usize,
    pub x_block_size: usize,
    pub y_block_size: usize,
    pub t_block_size: usize,
    /// Spatial grid stride
    pub x_step: usize,
    pub y_step: usize,
    /// Frames between consecutive extraction windows
    pub t_step: usize,
    /// Block reduction applied inside each pooled cell
    pub pooling: PoolingType,
    /// Channels concatenated into each descriptor, in order
    pub channels: Vec<Channel>,
    /// Half-width of the Lucas-Kanade window used by the flow channels
    pub flow_window_radius: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            scales: vec![1.0, 0.707, 0.5],
            local_width: 21,
            local_height: 21,
            local_duration: 9,
            x_block_size: 7,
            y_block_size: 7,
            t_block_size: 3,
            x_step: 11,
            y_step: 11,
            t_step: 5,
            pooling: PoolingType::Average,
            channels: Channel::DEFAULT.to_vec(),
            flow_window_radius: 2,
        }
    }
}

impl ExtractorConfig {
    /// Force local sizes odd, then check every size and step
    ///
    /// # Returns
    /// * `Ok(ExtractorConfig)` - Normalized copy safe to build buffers from
    /// * `Err(ConfigError)` - First violated constraint
    pub fn normalized(&self) -> Result<Self, ConfigError> {
        let mut config = self.clone();
        config.local_width = make_odd(config.local_width);
        config.local_height = make_odd(config.local_height);
        config.local_duration = make_odd(config.local_duration);

        if config.scales.is_empty() {
            return Err(ConfigError::EmptyScales);
        }
        if let Some(&value) = config.scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(ConfigError::InvalidScale { value });
        }
        if config.channels.is_empty() {
            return Err(ConfigError::ZeroSize {
                parameter: "channels".to_string(),
            });
        }

        for (axis, local, block) in [
            ('x', config.local_width, config.x_block_size),
            ('y', config.local_height, config.y_block_size),
            ('t', config.local_duration, config.t_block_size),
        ] {
            if block == 0 {
                return Err(ConfigError::ZeroSize {
                    parameter: format!("{}_block_size", axis),
                });
            }
            if local % block != 0 {
                return Err(ConfigError::NotDivisible {
                    axis,
                    local_size: local,
                    block_size: block,
                });
            }
        }

        for (axis, step) in [
            ('x', config.x_step),
            ('y', config.y_step),
            ('t', config.t_step),
        ] {
            if step == 0 {
                return Err(ConfigError::ZeroStep { axis });
            }
        }

        let uses_flow = config
            .channels
            .iter()
            .any(|c| matches!(c, Channel::FlowX | Channel::FlowY));
        if uses_flow && config.flow_window_radius == 0 {
            return Err(ConfigError::ZeroSize {
                parameter: "flow_window_radius".to_string(),
            });
        }

        Ok(config)
    }

    /// Number of pooled cells per channel
    pub fn blocks_per_channel(&self) -> usize {
        (self.local_width / self.x_block_size.max(1))
            * (self.local_height / self.y_block_size.max(1))
            * (self.local_duration / self.t_block_size.max(1))
    }
}

fn make_odd(size: usize) -> usize {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Decision forest training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of classes including the negative class
    pub n_classes: usize,
    pub n_trees: usize,
    /// Bootstrap sample size as a fraction of the training set
    pub bootstrap_ratio: f64,
    pub max_depth: usize,
    /// Nodes with fewer samples become leaves
    pub min_data: usize,
    /// Candidate (channel, dimension) pairs drawn per node
    pub n_splits: usize,
    /// Candidate thresholds drawn per split
    pub n_thresholds: usize,
    /// Background class; excluded from offset scoring and never votes
    pub negative_class: Option<usize>,
    pub criterion: CriterionKind,
    pub seed: u64,
    /// Worker threads used to build trees
    pub n_threads: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_classes: 7,
            n_trees: 15,
            bootstrap_ratio: 1.0,
            max_depth: 25,
            min_data: 10,
            n_splits: 30,
            n_thresholds: 10,
            negative_class: Some(6),
            criterion: CriterionKind::Alternating,
            seed: 1,
            n_threads: 6,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, value) in [
            ("n_classes", self.n_classes),
            ("n_trees", self.n_trees),
            ("max_depth", self.max_depth),
            ("n_splits", self.n_splits),
            ("n_thresholds", self.n_thresholds),
            ("n_threads", self.n_threads),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSize {
                    parameter: parameter.to_string(),
                });
            }
        }
        if !(self.bootstrap_ratio.is_finite() && self.bootstrap_ratio > 0.0) {
            return Err(ConfigError::InvalidRatio {
                parameter: "bootstrap_ratio".to_string(),
                value: self.bootstrap_ratio,
            });
        }
        if let Some(negative) = self.negative_class {
            if negative >= self.n_classes {
                return Err(ConfigError::InvalidParameter {
                    parameter: "negative_class".to_string(),
                    reason: format!("{} is not below n_classes {}", negative, self.n_classes),
                });
            }
        }
        Ok(())
    }

    /// True for every class that casts votes
    pub fn is_positive(&self, class: usize) -> bool {
        self.negative_class != Some(class)
    }
}

/// Hough voting space parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Multiplier applied to t, y and x before rounding to a cell
    pub discretize_ratio: f64,
    /// Cells evicted per eviction step, in discretized frames
    pub delete_step: usize,
    /// Initial window length `[0, buffer_length)` in discretized frames
    pub buffer_length: usize,
    /// Leaves holding more samples than this cast no votes
    pub invalid_leaf_size_threshold: Option<usize>,
    /// Keep per-cell (anchor, weight) lists for back-projection
    pub trace_contributions: bool,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            discretize_ratio: 0.5,
            delete_step: 50,
            buffer_length: 200,
            invalid_leaf_size_threshold: Some(300),
            trace_contributions: false,
        }
    }
}

impl VotingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.discretize_ratio.is_finite() && self.discretize_ratio > 0.0) {
            return Err(ConfigError::InvalidRatio {
                parameter: "discretize_ratio".to_string(),
                value: self.discretize_ratio,
            });
        }
        if self.delete_step == 0 {
            return Err(ConfigError::ZeroSize {
                parameter: "delete_step".to_string(),
            });
        }
        if self.buffer_length < self.delete_step {
            return Err(ConfigError::InvalidParameter {
                parameter: "buffer_length".to_string(),
                reason: format!(
                    "{} is shorter than delete_step {}",
                    self.buffer_length, self.delete_step
                ),
            });
        }
        Ok(())
    }

    /// Grid extent for one axis of `pixels` frame pixels
    pub fn grid_extent(&self, pixels: u32) -> usize {
        ((pixels as f64) * self.discretize_ratio).ceil().max(1.0) as usize
    }
}

/// Threaded detection pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extraction windows buffered between the extraction and voting threads
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or the defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = self.validate_sections();
        if let Err(err) = &result {
            log_config_error(err, "AppConfig::validate");
        }
        result
    }

    fn validate_sections(&self) -> Result<(), ConfigError> {
        self.extractor.normalized()?;
        self.forest.validate()?;
        self.voting.validate()?;
        if self.pipeline.channel_capacity == 0 {
            return Err(ConfigError::ZeroSize {
                parameter: "channel_capacity".to_string(),
            });
        }
        Ok(())
    }
}
