// Types module - Data structures for spatio-temporal feature extraction
//
// This module defines the channel and pooling enums shared by the
// configuration layer and the extractor, plus the per-window output.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::{Descriptor, SpatioTemporalAnchor};

/// Per-pixel feature channel computed for every buffered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Gray level as a float
    Intensity,
    /// 3x3 Sobel derivative along x
    XDerivative,
    /// 3x3 Sobel derivative along y
    YDerivative,
    /// Difference to the previous frame
    TDerivative,
    /// Dense Lucas-Kanade flow, x component
    FlowX,
    /// Dense Lucas-Kanade flow, y component
    FlowY,
}

impl Channel {
    /// Channel set used when the configuration does not name one
    pub const DEFAULT: [Channel; 4] = [
        Channel::Intensity,
        Channel::XDerivative,
        Channel::YDerivative,
        Channel::TDerivative,
    ];

    pub fn is_flow(&self) -> bool {
        matches!(self, Channel::FlowX | Channel::FlowY)
    }
}

/// Reduction applied to each pooled block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolingType {
    Average,
    Max,
}

/// Descriptors sampled from one scale for one window
#[derive(Debug, Clone, Serialize)]
pub struct ScaleFeatures {
    pub scale_index: usize,
    pub scale: f64,
    /// Anchors in un-scaled frame coordinates, parallel to `descriptors`
    pub anchors: Vec<SpatioTemporalAnchor>,
    pub descriptors: Vec<Descriptor>,
}

impl ScaleFeatures {
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpatioTemporalAnchor, &Descriptor)> {
        self.anchors.iter().zip(self.descriptors.iter())
    }
}

/// Everything produced when one temporal window completes
#[derive(Debug, Clone)]
pub struct ExtractionWindow {
    /// First feature frame covered by the window
    pub begin_t: usize,
    /// `(width, height)` of the un-scaled frames
    pub frame_size: (u32, u32),
    pub scales: Vec<ScaleFeatures>,
    /// Color frames consumed since the previous window
    pub color_frames: Vec<DynamicImage>,
    /// Frame index of `color_frames[0]`
    pub color_begin_t: usize,
}

impl ExtractionWindow {
    /// Total descriptors across all scales
    pub fn descriptor_count(&self) -> usize {
        self.scales.iter().map(ScaleFeatures::len).sum()
    }
}

/// Result of polling the streaming extractor
#[derive(Debug)]
pub enum Extraction {
    /// A temporal window completed
    Window(ExtractionWindow),
    /// Not enough frames buffered yet
    Pending,
    /// Input exhausted; sticky
    Ended,
}
