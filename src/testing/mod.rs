//! Deterministic video fixtures for tests and harnesses.
//!
//! Synthetic clips stand in for decoded video so extraction, training and
//! voting can be exercised end to end without codecs or datasets on disk.

pub mod synthetic;

pub use synthetic::{noise_video, static_video, MovingSquare, SyntheticClip};
