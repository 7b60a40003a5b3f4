//! Synthetic clip generators.
//!
//! `MovingSquare` renders a bright square sliding horizontally over a dark
//! background and records where its center is in every frame, which is the
//! ground truth the detection tests compare vote peaks against.

use image::{DynamicImage, GrayImage, Luma};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::types::{Rect, SpatioTemporalVolume};

/// Rendered frames plus per-frame ground truth
#[derive(Debug, Clone)]
pub struct SyntheticClip {
    pub frames: Vec<DynamicImage>,
    /// Square bounding box per frame
    pub boxes: Vec<Rect>,
}

impl SyntheticClip {
    /// `[y, x]` center of the square in frame `t`
    pub fn center(&self, t: usize) -> [f32; 2] {
        let rect = self.boxes[t];
        [
            rect.y as f32 + rect.height as f32 / 2.0,
            rect.x as f32 + rect.width as f32 / 2.0,
        ]
    }

    /// Volume spanning frames `[start_t, end_t)` around the square's mean position
    pub fn volume(&self, start_t: usize, end_t: usize) -> Option<SpatioTemporalVolume> {
        let boxes = self.boxes.get(start_t..end_t)?;
        let x0 = boxes.iter().map(|b| b.x).min()?;
        let y0 = boxes.iter().map(|b| b.y).min()?;
        let x1 = boxes.iter().map(|b| b.x + b.width).max()?;
        let y1 = boxes.iter().map(|b| b.y + b.height).max()?;
        SpatioTemporalVolume::from_corners((x0, y0), (x1, y1), start_t as i32, end_t as i32).ok()
    }
}

/// Bright square moving along x at a constant velocity
#[derive(Debug, Clone)]
pub struct MovingSquare {
    pub width: u32,
    pub height: u32,
    pub size: u32,
    pub start_x: u32,
    pub y: u32,
    /// Pixels per frame; positions are floored
    pub velocity: f32,
    pub foreground: u8,
    pub background: u8,
}

impl Default for MovingSquare {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            size: 8,
            start_x: 8,
            y: 24,
            velocity: 0.75,
            foreground: 255,
            background: 0,
        }
    }
}

impl MovingSquare {
    /// Left edge of the square in frame `t`
    pub fn x_at(&self, t: usize) -> u32 {
        self.start_x + (self.velocity * t as f32).floor() as u32
    }

    pub fn render(&self, n_frames: usize) -> SyntheticClip {
        let mut frames = Vec::with_capacity(n_frames);
        let mut boxes = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let x0 = self.x_at(t);
            let rect = Rect::new(x0 as i32, self.y as i32, self.size as i32, self.size as i32);
            let image = GrayImage::from_fn(self.width, self.height, |x, y| {
                let inside = (x0..x0 + self.size).contains(&x)
                    && (self.y..self.y + self.size).contains(&y);
                Luma([if inside {
                    self.foreground
                } else {
                    self.background
                }])
            });
            frames.push(DynamicImage::ImageLuma8(image));
            boxes.push(rect);
        }
        SyntheticClip { frames, boxes }
    }
}

/// Uniform gray frames
pub fn static_video(width: u32, height: u32, n_frames: usize, value: u8) -> Vec<DynamicImage> {
    (0..n_frames)
        .map(|_| DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))))
        .collect()
}

/// Seeded uniform noise, reproducible across runs
pub fn noise_video(width: u32, height: u32, n_frames: usize, seed: u64) -> Vec<DynamicImage> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_frames)
        .map(|_| {
            DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, _| {
                Luma([rng.gen::<u8>()])
            }))
        })
        .collect()
}
