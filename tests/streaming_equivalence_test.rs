//! Streaming extraction from an image-sequence directory
//!
//! Frames are written to a temporary directory as PNG files, read back one
//! by one through `ImageSequenceSource`, and the resulting windows must be
//! bit-identical to the whole-video reference path.

use std::fs;
use std::path::{Path, PathBuf};

use action_forest::config::ExtractorConfig;
use action_forest::features::{
    Channel, Extraction, ExtractionWindow, ImageSequenceSource, LocalFeatureExtractor, PoolingType,
};
use action_forest::testing::{noise_video, MovingSquare};
use image::DynamicImage;

fn write_frames(name: &str, frames: &[DynamicImage]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("action_forest_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for (i, frame) in frames.iter().enumerate() {
        frame.save(dir.join(format!("frame_{:04}.png", i))).unwrap();
    }
    dir
}

fn config(t_step: usize, channels: Vec<Channel>) -> ExtractorConfig {
    ExtractorConfig {
        scales: vec![1.0, 0.75, 0.5],
        local_width: 9,
        local_height: 9,
        local_duration: 5,
        x_block_size: 3,
        y_block_size: 3,
        t_block_size: 5,
        x_step: 6,
        y_step: 6,
        t_step,
        pooling: PoolingType::Average,
        channels,
        flow_window_radius: 2,
    }
}

fn stream(dir: &Path, config: &ExtractorConfig) -> Vec<ExtractionWindow> {
    let mut source = ImageSequenceSource::open(dir).unwrap();
    let mut extractor = LocalFeatureExtractor::new(config).unwrap();
    let mut windows = Vec::new();
    while let Extraction::Window(window) = extractor.extract(&mut source).unwrap() {
        windows.push(window);
    }
    assert!(extractor.is_ended());
    windows
}

fn assert_same_windows(streamed: &[ExtractionWindow], reference: &[ExtractionWindow]) {
    assert_eq!(streamed.len(), reference.len());
    for (a, b) in streamed.iter().zip(reference) {
        assert_eq!(a.begin_t, b.begin_t);
        assert_eq!(a.color_begin_t, b.color_begin_t);
        assert_eq!(a.color_frames.len(), b.color_frames.len());
        for (sa, sb) in a.scales.iter().zip(&b.scales) {
            assert_eq!(sa.anchors, sb.anchors, "window {}", a.begin_t);
            assert_eq!(sa.descriptors, sb.descriptors, "window {}", a.begin_t);
        }
    }
}

#[test]
fn test_directory_stream_matches_whole_video() {
    let frames = noise_video(40, 32, 23, 17);
    let dir = write_frames("noise", &frames);

    for t_step in [2, 5, 7] {
        let config = config(t_step, Channel::DEFAULT.to_vec());
        let streamed = stream(&dir, &config);
        let reference = LocalFeatureExtractor::new(&config)
            .unwrap()
            .extract_all(&frames)
            .unwrap();
        assert!(!reference.is_empty());
        assert_same_windows(&streamed, &reference);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_flow_channels_stream_identically() {
    let clip = MovingSquare {
        width: 40,
        height: 32,
        y: 12,
        ..MovingSquare::default()
    }
    .render(15);
    let dir = write_frames("flow", &clip.frames);

    let config = config(3, vec![Channel::Intensity, Channel::FlowX, Channel::FlowY]);
    let streamed = stream(&dir, &config);
    let reference = LocalFeatureExtractor::new(&config)
        .unwrap()
        .extract_all(&clip.frames)
        .unwrap();
    assert_same_windows(&streamed, &reference);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_repeated_extraction_is_deterministic() {
    let frames = noise_video(24, 24, 12, 5);
    let config = config(2, Channel::DEFAULT.to_vec());
    let extractor = LocalFeatureExtractor::new(&config).unwrap();
    let first = extractor.extract_all(&frames).unwrap();
    let second = extractor.extract_all(&frames).unwrap();
    assert_same_windows(&first, &second);
}
