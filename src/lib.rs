// Action Forest Core - streaming spatio-temporal action detection
// Multi-scale local features, randomized Hough forest, sparse 4D voting

// Module declarations
pub mod config;
pub mod detection;
pub mod error;
pub mod features;
pub mod forest;
pub mod index;
pub mod sampling;
pub mod testing;
pub mod types;
pub mod voting;

// Re-exports for convenience
pub use config::AppConfig;
pub use detection::{Detector, VoteBand};
pub use features::{Extraction, ExtractionWindow, FrameSource, LocalFeatureExtractor};
pub use forest::{DecisionForest, TrainingSample};
pub use types::{Descriptor, SpatioTemporalAnchor, SpatioTemporalVolume};
pub use voting::{VoteCell, VotingSpace};
