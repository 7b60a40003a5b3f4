// Core data model shared by extraction, training, voting and detection
//
// Descriptors and anchors come out of the feature extractor, volumes
// describe annotated actions, and detection results are what a peak
// extractor hands back after reading the voting space.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pooled local descriptor: `n_channels` equally sized channel blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    values: Vec<f32>,
    n_channels: usize,
}

impl Descriptor {
    /// Build a descriptor from concatenated channel blocks
    ///
    /// `values.len()` must be a multiple of `n_channels`.
    pub fn new(values: Vec<f32>, n_channels: usize) -> Self {
        debug_assert!(n_channels > 0 && values.len() % n_channels == 0);
        Self { values, n_channels }
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of pooled values per channel
    pub fn channel_len(&self) -> usize {
        self.values.len() / self.n_channels
    }

    pub fn value(&self, channel: usize, dimension: usize) -> f32 {
        self.values[channel * self.channel_len() + dimension]
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        let len = self.channel_len();
        &self.values[channel * len..(channel + 1) * len]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_channels, self.channel_len())
    }
}

/// Descriptor center in un-scaled frame coordinates plus the scale it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatioTemporalAnchor {
    pub t: usize,
    pub y: usize,
    pub x: usize,
    pub scale_index: usize,
}

impl SpatioTemporalAnchor {
    /// `[t, y, x]` as floats
    pub fn position(&self) -> [f32; 3] {
        [self.t as f32, self.y as f32, self.x as f32]
    }
}

/// Axis-aligned rectangle in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    fn intersection(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

/// Half-open spatio-temporal box: `rect × [start_t, end_t)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatioTemporalVolume {
    rect: Rect,
    start_t: i32,
    end_t: i32,
}

impl SpatioTemporalVolume {
    /// # Returns
    /// * `Err(ConfigError::DegenerateVolume)` - empty rectangle or `start_t >= end_t`
    pub fn new(rect: Rect, start_t: i32, end_t: i32) -> Result<Self, ConfigError> {
        if rect.width <= 0 || rect.height <= 0 {
            return Err(ConfigError::DegenerateVolume {
                reason: format!("rectangle {}x{}", rect.width, rect.height),
            });
        }
        if start_t >= end_t {
            return Err(ConfigError::DegenerateVolume {
                reason: format!("frames [{}, {})", start_t, end_t),
            });
        }
        Ok(Self {
            rect,
            start_t,
            end_t,
        })
    }

    /// Build from top-left and bottom-right corners (bottom-right exclusive)
    pub fn from_corners(
        top_left: (i32, i32),
        bottom_right: (i32, i32),
        start_t: i32,
        end_t: i32,
    ) -> Result<Self, ConfigError> {
        let rect = Rect::new(
            top_left.0,
            top_left.1,
            bottom_right.0 - top_left.0,
            bottom_right.1 - top_left.1,
        );
        Self::new(rect, start_t, end_t)
    }

    /// Build around a center point; extents are split evenly on both sides
    pub fn from_center(
        center: (i32, i32, i32),
        width: i32,
        height: i32,
        duration: i32,
    ) -> Result<Self, ConfigError> {
        let (x, y, t) = center;
        let rect = Rect::new(x - width / 2, y - height / 2, width, height);
        Self::new(rect, t - duration / 2, t - duration / 2 + duration)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn start_t(&self) -> i32 {
        self.start_t
    }

    pub fn end_t(&self) -> i32 {
        self.end_t
    }

    pub fn duration(&self) -> i32 {
        self.end_t - self.start_t
    }

    pub fn volume(&self) -> i64 {
        self.rect.area() * self.duration() as i64
    }

    /// `[t, y, x]` center
    pub fn center(&self) -> [f32; 3] {
        [
            (self.start_t + self.end_t) as f32 / 2.0,
            self.rect.y as f32 + self.rect.height as f32 / 2.0,
            self.rect.x as f32 + self.rect.width as f32 / 2.0,
        ]
    }

    pub fn contains(&self, t: i32, y: i32, x: i32) -> bool {
        (self.start_t..self.end_t).contains(&t)
            && (self.rect.y..self.rect.y + self.rect.height).contains(&y)
            && (self.rect.x..self.rect.x + self.rect.width).contains(&x)
    }

    /// Intersection volume over union volume
    pub fn overlap_ratio(&self, other: &SpatioTemporalVolume) -> f64 {
        let duration = (self.end_t.min(other.end_t) - self.start_t.max(other.start_t)).max(0);
        let intersection = self.rect.intersection(&other.rect).area() * duration as i64;
        let union = self.volume() + other.volume() - intersection;
        if union <= 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }
}

/// Peak in the voting space, in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalMaximum {
    /// `[t, y, x, scale]`
    pub point: [f32; 4],
    pub value: f32,
}

/// Descriptor anchor that voted for a peak and how much it contributed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContributionPoint {
    pub anchor: SpatioTemporalAnchor,
    pub weight: f32,
}

/// Output of an external peak extraction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub class: usize,
    pub maximum: LocalMaximum,
    pub contributions: Vec<ContributionPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(x: i32, y: i32, w: i32, h: i32, start: i32, end: i32) -> SpatioTemporalVolume {
        SpatioTemporalVolume::new(Rect::new(x, y, w, h), start, end).expect("valid volume")
    }

    #[test]
    fn test_descriptor_channel_addressing() {
        let descriptor = Descriptor::new(vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0], 2);
        assert_eq!(descriptor.shape(), (2, 3));
        assert_eq!(descriptor.value(1, 2), 12.0);
        assert_eq!(descriptor.channel(0), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_volume_is_area_times_duration() {
        assert_eq!(volume(0, 0, 4, 5, 10, 13).volume(), 60);
    }

    #[test]
    fn test_identical_volumes_overlap_fully() {
        let a = volume(3, 4, 10, 10, 0, 5);
        assert!((a.overlap_ratio(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_half_shifted_volume_overlap() {
        let a = volume(0, 0, 10, 10, 0, 10);
        // Half the frames overlap: intersection 500, union 1500
        let b = volume(0, 0, 10, 10, 5, 15);
        assert!((a.overlap_ratio(&b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_volumes_do_not_overlap() {
        let a = volume(0, 0, 10, 10, 0, 10);
        let spatial = volume(20, 20, 5, 5, 0, 10);
        let temporal = volume(0, 0, 10, 10, 10, 20);
        assert_eq!(a.overlap_ratio(&spatial), 0.0);
        assert_eq!(a.overlap_ratio(&temporal), 0.0);
    }

    #[test]
    fn test_degenerate_volumes_rejected() {
        assert!(SpatioTemporalVolume::new(Rect::new(0, 0, 0, 4), 0, 3).is_err());
        assert!(SpatioTemporalVolume::new(Rect::new(0, 0, 4, 4), 3, 3).is_err());
    }

    #[test]
    fn test_constructors_agree() {
        let from_rect = volume(10, 20, 8, 6, 4, 10);
        let from_corners =
            SpatioTemporalVolume::from_corners((10, 20), (18, 26), 4, 10).expect("valid corners");
        let from_center = SpatioTemporalVolume::from_center((14, 23, 7), 8, 6, 6).expect("valid");
        assert_eq!(from_rect, from_corners);
        assert_eq!(from_rect, from_center);
        assert_eq!(from_rect.center(), [7.0, 23.0, 14.0]);
    }

    #[test]
    fn test_contains_is_half_open() {
        let v = volume(0, 0, 4, 4, 0, 2);
        assert!(v.contains(0, 0, 0));
        assert!(v.contains(1, 3, 3));
        assert!(!v.contains(2, 0, 0));
        assert!(!v.contains(0, 4, 0));
    }
}
