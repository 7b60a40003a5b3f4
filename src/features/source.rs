// Frame sources - sequential frame providers for the extractor
//
// Video decoding is out of scope; sources either wrap frames already in
// memory or read a directory of numbered still images.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::FrameSourceError;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "pgm", "ppm", "tif"];

/// Sequential frame provider; `Ok(None)` marks the end of the stream
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, FrameSourceError>;
}

/// Frames held in memory, yielded front to back
#[derive(Debug, Default)]
pub struct MemoryFrameSource {
    frames: VecDeque<DynamicImage>,
}

impl MemoryFrameSource {
    pub fn new(frames: impl IntoIterator<Item = DynamicImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, FrameSourceError> {
        Ok(self.frames.pop_front())
    }
}

/// Directory of still images read in file-name order
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    /// List image files under `dir`, sorted by file name
    ///
    /// # Returns
    /// * `Err(FrameSourceError::Io)` - directory could not be listed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, FrameSourceError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();
        log::info!(
            "[FrameSource] {} frames found under {:?}",
            paths.len(),
            dir.as_ref()
        );
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, FrameSourceError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        image::open(path)
            .map(Some)
            .map_err(|err| FrameSourceError::Decode {
                path: path.display().to_string(),
                reason: err.to_string(),
            })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
