// LocalFeatureExtractor - streaming multi-scale spatio-temporal descriptors
//
// Frames are pushed one at a time. Every scale keeps the last raw frame as
// a derivative seed plus one frame-major feature buffer per channel. Once
// `local_duration` feature frames are buffered, a dense grid of pooled
// descriptors is sampled per scale and the oldest `t_step` frames are
// dropped, so memory stays bounded by one window per scale.
//
// Module organization:
// - types: Channel and pooling enums, per-window output
// - channels: Per-frame feature planes (intensity, Sobel, frame difference, flow)
// - flow: Dense Lucas-Kanade optical flow
// - pooling: Block reduction of a local neighborhood
// - source: Frame providers (memory, image sequence directory)
// - mod.rs: Coordinator (LocalFeatureExtractor)

mod channels;
mod flow;
mod pooling;
mod source;
mod types;

pub use flow::{dense_lucas_kanade, FlowField};
pub use pooling::PoolingGeometry;
pub use source::{FrameSource, ImageSequenceSource, MemoryFrameSource};
pub use types::{Channel, Extraction, ExtractionWindow, PoolingType, ScaleFeatures};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, FrameSourceError};
use crate::index::FrameLayout;
use crate::types::{Descriptor, SpatioTemporalAnchor};

use channels::compute_planes;
use pooling::pool_neighborhood;

/// Size of `dim` pixels after scaling, used for both resizing and indexing
pub fn scaled_dimension(dim: u32, scale: f64) -> u32 {
    (dim as f64 * scale).round().max(1.0) as u32
}

/// Per-scale raw seed frame and feature buffers
struct ScaleBuffer {
    scale: f64,
    width: u32,
    height: u32,
    layout: FrameLayout,
    seed: Option<GrayImage>,
    planes: Vec<Vec<f32>>,
}

impl ScaleBuffer {
    fn new(scale: f64, frame_size: (u32, u32), n_channels: usize) -> Self {
        let width = scaled_dimension(frame_size.0, scale);
        let height = scaled_dimension(frame_size.1, scale);
        Self {
            scale,
            width,
            height,
            layout: FrameLayout::new([height as usize, width as usize]),
            seed: None,
            planes: vec![Vec::new(); n_channels],
        }
    }

    fn scaled(&self, gray: &GrayImage) -> GrayImage {
        if gray.dimensions() == (self.width, self.height) {
            gray.clone()
        } else {
            imageops::resize(gray, self.width, self.height, FilterType::CatmullRom)
        }
    }

    /// Append feature planes for `gray`; the first frame seeds itself
    fn push(&mut self, gray: &GrayImage, config: &ExtractorConfig) {
        let frame = self.scaled(gray);
        let previous = self.seed.take().unwrap_or_else(|| frame.clone());
        let planes = compute_planes(
            &config.channels,
            &previous,
            &frame,
            config.flow_window_radius,
        );
        for (buffer, plane) in self.planes.iter_mut().zip(planes) {
            buffer.extend(plane);
        }
        self.seed = Some(frame);
    }

    /// Track a skipped frame so the next derivative uses it as `previous`
    fn advance_seed(&mut self, gray: &GrayImage) {
        self.seed = Some(self.scaled(gray));
    }

    fn drain_frames(&mut self, n_frames: usize) {
        let end = self.layout.outer_start(n_frames);
        for buffer in &mut self.planes {
            let end = end.min(buffer.len());
            buffer.drain(..end);
        }
    }
}

/// Streaming multi-scale feature extractor
pub struct LocalFeatureExtractor {
    config: ExtractorConfig,
    geometry: PoolingGeometry,
    frame_size: Option<(u32, u32)>,
    scales: Vec<ScaleBuffer>,
    color_frames: Vec<DynamicImage>,
    color_begin_t: usize,
    frames_seen: usize,
    feature_begin_t: usize,
    n_stored_frames: usize,
    frames_to_skip: usize,
    input_finished: bool,
    ended: bool,
}

impl LocalFeatureExtractor {
    /// Create an extractor; local sizes are forced odd before validation
    ///
    /// # Returns
    /// * `Err(ConfigError)` - block sizes do not divide local sizes, a step is
    ///   zero, or the scale list is empty or invalid
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let config = config.normalized()?;
        let geometry = PoolingGeometry {
            local: [config.local_duration, config.local_height, config.local_width],
            block: [config.t_block_size, config.y_block_size, config.x_block_size],
        };
        log::info!(
            "[Extractor] local={}x{}x{} blocks={}x{}x{} steps={}/{}/{} scales={:?}",
            config.local_width,
            config.local_height,
            config.local_duration,
            config.x_block_size,
            config.y_block_size,
            config.t_block_size,
            config.x_step,
            config.y_step,
            config.t_step,
            config.scales
        );
        Ok(Self {
            config,
            geometry,
            frame_size: None,
            scales: Vec::new(),
            color_frames: Vec::new(),
            color_begin_t: 0,
            frames_seen: 0,
            feature_begin_t: 0,
            n_stored_frames: 0,
            frames_to_skip: 0,
            input_finished: false,
            ended: false,
        })
    }

    /// Normalized configuration in effect
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Length of every descriptor this extractor produces
    pub fn descriptor_len(&self) -> usize {
        self.config.channels.len() * self.geometry.n_blocks()
    }

    /// Frame size fixed by the first pushed frame
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    /// First feature frame held in the buffers
    pub fn stored_feature_begin_t(&self) -> usize {
        self.feature_begin_t
    }

    pub fn n_stored_frames(&self) -> usize {
        self.n_stored_frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed the next frame of the stream
    ///
    /// # Returns
    /// * `Err(FrameSourceError::EmptyFrame)` - zero-sized frame
    /// * `Err(FrameSourceError::SizeMismatch)` - size differs from the first frame
    pub fn push_frame(&mut self, frame: DynamicImage) -> Result<(), FrameSourceError> {
        let size = check_frame_size(self.frame_size, &frame)?;
        if self.frame_size.is_none() {
            self.frame_size = Some(size);
            self.scales = self
                .config
                .scales
                .iter()
                .map(|&scale| ScaleBuffer::new(scale, size, self.config.channels.len()))
                .collect();
        }

        let gray = frame.to_luma8();
        let index = self.frames_seen;
        self.frames_seen += 1;

        if self.frames_to_skip > 0 {
            self.frames_to_skip -= 1;
            for scale in &mut self.scales {
                scale.advance_seed(&gray);
            }
            return Ok(());
        }

        if self.color_frames.is_empty() {
            self.color_begin_t = index;
        }
        self.color_frames.push(frame);
        for scale in &mut self.scales {
            scale.push(&gray, &self.config);
        }
        self.n_stored_frames += 1;
        Ok(())
    }

    /// Mark the end of the stream
    pub fn finish(&mut self) {
        self.input_finished = true;
    }

    /// Emit the next completed window, if any
    ///
    /// Returns `Pending` until `local_duration` frames are buffered and
    /// `Ended` (for good) once the stream is finished without a full window.
    pub fn poll(&mut self) -> Extraction {
        if self.ended {
            return Extraction::Ended;
        }
        if self.n_stored_frames < self.config.local_duration {
            if self.input_finished {
                log::debug!(
                    "[Extractor] Stream ended with {} buffered frames",
                    self.n_stored_frames
                );
                self.ended = true;
                return Extraction::Ended;
            }
            return Extraction::Pending;
        }

        let begin_t = self.feature_begin_t;
        let scales = self
            .scales
            .iter()
            .enumerate()
            .map(|(scale_index, buffer)| {
                dense_sampling(
                    &buffer.planes,
                    &buffer.layout,
                    0,
                    begin_t,
                    scale_index,
                    buffer.scale,
                    &self.config,
                    &self.geometry,
                )
            })
            .collect();
        let window = ExtractionWindow {
            begin_t,
            frame_size: self.frame_size.unwrap_or((0, 0)),
            scales,
            color_frames: std::mem::take(&mut self.color_frames),
            color_begin_t: self.color_begin_t,
        };
        log::debug!(
            "[Extractor] Window begin_t={} descriptors={}",
            begin_t,
            window.descriptor_count()
        );

        self.delete_old_data();
        Extraction::Window(window)
    }

    /// Pull frames from `source` until a window completes or the stream ends
    pub fn extract<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Extraction, FrameSourceError> {
        loop {
            match self.poll() {
                Extraction::Pending => match source.next_frame()? {
                    Some(frame) => self.push_frame(frame)?,
                    None => self.finish(),
                },
                extraction => return Ok(extraction),
            }
        }
    }

    /// Drop the `t_step` oldest feature frames
    ///
    /// With `local_duration > t_step` this trims the buffer prefix. Otherwise
    /// the whole buffer goes and the next `t_step - local_duration` frames
    /// are skipped; the seed frame is kept either way.
    fn delete_old_data(&mut self) {
        let t_step = self.config.t_step;
        let drained = t_step.min(self.n_stored_frames);
        for scale in &mut self.scales {
            scale.drain_frames(drained);
        }
        self.n_stored_frames -= drained;
        self.frames_to_skip = t_step - drained;
        self.feature_begin_t += t_step;
    }

    /// Compute every window of a whole video without eviction
    ///
    /// Produces the same windows as pushing the frames one by one.
    pub fn extract_all(
        &self,
        frames: &[DynamicImage],
    ) -> Result<Vec<ExtractionWindow>, FrameSourceError> {
        let mut frame_size = None;
        for frame in frames {
            frame_size = Some(check_frame_size(frame_size, frame)?);
        }
        let Some(size) = frame_size else {
            return Ok(Vec::new());
        };

        let mut buffers: Vec<ScaleBuffer> = self
            .config
            .scales
            .iter()
            .map(|&scale| ScaleBuffer::new(scale, size, self.config.channels.len()))
            .collect();
        for frame in frames {
            let gray = frame.to_luma8();
            for buffer in &mut buffers {
                buffer.push(&gray, &self.config);
            }
        }

        let duration = self.config.local_duration;
        let mut windows = Vec::new();
        let mut begin_t = 0;
        let mut previous_end = 0;
        while begin_t + duration <= frames.len() {
            let scales = buffers
                .iter()
                .enumerate()
                .map(|(scale_index, buffer)| {
                    dense_sampling(
                        &buffer.planes,
                        &buffer.layout,
                        begin_t,
                        begin_t,
                        scale_index,
                        buffer.scale,
                        &self.config,
                        &self.geometry,
                    )
                })
                .collect();
            let color_begin_t = previous_end.max(begin_t);
            windows.push(ExtractionWindow {
                begin_t,
                frame_size: size,
                scales,
                color_frames: frames[color_begin_t..begin_t + duration].to_vec(),
                color_begin_t,
            });
            previous_end = begin_t + duration;
            begin_t += self.config.t_step;
        }
        Ok(windows)
    }
}

fn check_frame_size(
    expected: Option<(u32, u32)>,
    frame: &DynamicImage,
) -> Result<(u32, u32), FrameSourceError> {
    let found = (frame.width(), frame.height());
    if found.0 == 0 || found.1 == 0 {
        return Err(FrameSourceError::EmptyFrame);
    }
    match expected {
        Some(expected) if expected != found => {
            Err(FrameSourceError::SizeMismatch { expected, found })
        }
        _ => Ok(found),
    }
}

/// Sample the dense descriptor grid of one scale
///
/// `t_origin` is the buffer frame where the window starts, `begin_t` the
/// absolute frame number of that same frame.
#[allow(clippy::too_many_arguments)]
fn dense_sampling(
    planes: &[Vec<f32>],
    layout: &FrameLayout,
    t_origin: usize,
    begin_t: usize,
    scale_index: usize,
    scale: f64,
    config: &ExtractorConfig,
    geometry: &PoolingGeometry,
) -> ScaleFeatures {
    let [height, width] = layout.extents();
    let mut anchors = Vec::new();
    let mut descriptors = Vec::new();

    if width >= config.local_width && height >= config.local_height {
        for y in (0..=height - config.local_height).step_by(config.y_step) {
            for x in (0..=width - config.local_width).step_by(config.x_step) {
                let mut values = Vec::with_capacity(planes.len() * geometry.n_blocks());
                for plane in planes {
                    pool_neighborhood(
                        plane,
                        layout,
                        [t_origin, y, x],
                        geometry,
                        config.pooling,
                        &mut values,
                    );
                }
                anchors.push(SpatioTemporalAnchor {
                    t: begin_t + config.local_duration / 2,
                    y: unscale(y + config.local_height / 2, scale),
                    x: unscale(x + config.local_width / 2, scale),
                    scale_index,
                });
                descriptors.push(Descriptor::new(values, planes.len()));
            }
        }
    }

    ScaleFeatures {
        scale_index,
        scale,
        anchors,
        descriptors,
    }
}

fn unscale(coordinate: usize, scale: f64) -> usize {
    (coordinate as f64 / scale).round() as usize
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
