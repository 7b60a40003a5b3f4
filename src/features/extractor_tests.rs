use super::*;
use crate::testing::{noise_video, static_video, MovingSquare};

/// Small single-scale configuration: 9x9x3 windows, 3x3x1 blocks
fn small_config() -> ExtractorConfig {
    ExtractorConfig {
        scales: vec![1.0],
        local_width: 9,
        local_height: 9,
        local_duration: 3,
        x_block_size: 3,
        y_block_size: 3,
        t_block_size: 1,
        x_step: 8,
        y_step: 8,
        t_step: 1,
        ..ExtractorConfig::default()
    }
}

/// Drain every window from a memory source
fn stream_all(config: &ExtractorConfig, frames: Vec<DynamicImage>) -> Vec<ExtractionWindow> {
    let mut extractor = LocalFeatureExtractor::new(config).expect("valid config");
    let mut source = MemoryFrameSource::new(frames);
    let mut windows = Vec::new();
    loop {
        match extractor.extract(&mut source).expect("frames are consistent") {
            Extraction::Window(window) => windows.push(window),
            Extraction::Ended => break,
            Extraction::Pending => unreachable!("extract never returns Pending"),
        }
    }
    windows
}

fn assert_windows_equal(streamed: &[ExtractionWindow], reference: &[ExtractionWindow]) {
    assert_eq!(streamed.len(), reference.len(), "window count differs");
    for (a, b) in streamed.iter().zip(reference) {
        assert_eq!(a.begin_t, b.begin_t);
        assert_eq!(a.color_begin_t, b.color_begin_t);
        assert_eq!(a.color_frames.len(), b.color_frames.len());
        assert_eq!(a.scales.len(), b.scales.len());
        for (sa, sb) in a.scales.iter().zip(&b.scales) {
            assert_eq!(sa.anchors, sb.anchors, "anchors differ at begin_t {}", a.begin_t);
            // Bit-identical, not approximately equal
            assert_eq!(
                sa.descriptors, sb.descriptors,
                "descriptors differ at begin_t {} scale {}",
                a.begin_t, sa.scale_index
            );
        }
    }
}

#[test]
fn test_window_schedule_with_overlap() {
    let config = ExtractorConfig {
        local_duration: 5,
        t_block_size: 1,
        t_step: 2,
        ..small_config()
    };
    let windows = stream_all(&config, static_video(32, 24, 20, 50));
    let begins: Vec<usize> = windows.iter().map(|w| w.begin_t).collect();
    assert_eq!(begins, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    // Temporal anchor sits in the middle of the window
    assert!(windows[3].scales[0].anchors.iter().all(|a| a.t == 6 + 2));
}

#[test]
fn test_window_schedule_without_overlap_skips_frames() {
    let config = ExtractorConfig {
        t_step: 5,
        ..small_config()
    };
    let windows = stream_all(&config, static_video(32, 24, 17, 50));
    let begins: Vec<usize> = windows.iter().map(|w| w.begin_t).collect();
    // Window k covers [5k, 5k + 3); a fourth would need frame 17
    assert_eq!(begins, vec![0, 5, 10]);
    for window in &windows {
        assert_eq!(window.color_begin_t, window.begin_t);
        assert_eq!(window.color_frames.len(), 3);
    }
}

#[test]
fn test_dense_grid_and_anchor_positions() {
    let windows = stream_all(&small_config(), static_video(32, 24, 3, 80));
    assert_eq!(windows.len(), 1);
    let scale = &windows[0].scales[0];
    // y in {0, 8}, x in {0, 8, 16}
    assert_eq!(scale.len(), 6);
    assert_eq!(
        scale.anchors[0],
        SpatioTemporalAnchor {
            t: 1,
            y: 4,
            x: 4,
            scale_index: 0
        }
    );
    assert_eq!(scale.anchors[5].y, 12);
    assert_eq!(scale.anchors[5].x, 20);
}

#[test]
fn test_descriptor_layout_for_static_video() {
    let windows = stream_all(&small_config(), static_video(32, 24, 3, 80));
    let descriptor = &windows[0].scales[0].descriptors[0];
    // 4 channels x (3 * 3 * 3) blocks
    assert_eq!(descriptor.shape(), (4, 27));
    assert!(descriptor.channel(0).iter().all(|v| *v == 80.0));
    // Flat frames: no spatial gradient, and the seed duplicate gives no temporal one
    for channel in 1..4 {
        assert!(
            descriptor.channel(channel).iter().all(|v| *v == 0.0),
            "channel {} should be zero on a static video",
            channel
        );
    }
}

#[test]
fn test_t_derivative_sees_motion() {
    let clip = MovingSquare::default().render(8);
    let windows = stream_all(&small_config(), clip.frames);
    let moving = windows
        .iter()
        .flat_map(|w| w.scales[0].descriptors.iter())
        .any(|d| d.channel(3).iter().any(|v| *v != 0.0));
    assert!(moving, "a moving square must produce temporal derivatives");
}

#[test]
fn test_pending_until_window_full_then_ended_is_sticky() {
    let mut extractor = LocalFeatureExtractor::new(&small_config()).unwrap();
    assert!(matches!(extractor.poll(), Extraction::Pending));
    for frame in static_video(16, 16, 2, 10) {
        extractor.push_frame(frame).unwrap();
        assert!(matches!(extractor.poll(), Extraction::Pending));
    }
    extractor.finish();
    assert!(matches!(extractor.poll(), Extraction::Ended));
    assert!(extractor.is_ended());
    // More frames after the end do not resurrect the stream
    for frame in static_video(16, 16, 3, 10) {
        extractor.push_frame(frame).unwrap();
    }
    assert!(matches!(extractor.poll(), Extraction::Ended));
}

#[test]
fn test_buffers_stay_bounded() {
    let config = ExtractorConfig {
        local_duration: 5,
        t_step: 2,
        ..small_config()
    };
    let mut extractor = LocalFeatureExtractor::new(&config).unwrap();
    for frame in noise_video(24, 24, 30, 3) {
        extractor.push_frame(frame).unwrap();
        if let Extraction::Window(_) = extractor.poll() {
            assert_eq!(extractor.n_stored_frames(), 3);
        }
        assert!(extractor.n_stored_frames() <= 5);
    }
}

#[test]
fn test_frame_size_change_is_rejected() {
    let mut extractor = LocalFeatureExtractor::new(&small_config()).unwrap();
    extractor
        .push_frame(static_video(16, 16, 1, 0).remove(0))
        .unwrap();
    let err = extractor
        .push_frame(static_video(8, 16, 1, 0).remove(0))
        .unwrap_err();
    assert_eq!(
        err,
        FrameSourceError::SizeMismatch {
            expected: (16, 16),
            found: (8, 16)
        }
    );
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let config = ExtractorConfig {
        x_block_size: 2,
        ..small_config()
    };
    assert!(matches!(
        LocalFeatureExtractor::new(&config),
        Err(ConfigError::NotDivisible { axis: 'x', .. })
    ));
}

#[test]
fn test_scale_smaller_than_window_yields_no_points() {
    let config = ExtractorConfig {
        scales: vec![1.0, 0.25],
        ..small_config()
    };
    let windows = stream_all(&config, static_video(32, 32, 3, 10));
    assert!(!windows[0].scales[0].is_empty());
    // 32 * 0.25 = 8 < 9
    assert!(windows[0].scales[1].is_empty());
}

#[test]
fn test_anchors_are_reported_in_unscaled_coordinates() {
    let config = ExtractorConfig {
        scales: vec![0.5],
        ..small_config()
    };
    let windows = stream_all(&config, static_video(40, 40, 3, 10));
    let scale = &windows[0].scales[0];
    // Scaled frame is 20x20: grid y, x in {0, 8}; centers 4 and 12 map to 8 and 24
    assert_eq!(scale.len(), 4);
    assert_eq!((scale.anchors[0].y, scale.anchors[0].x), (8, 8));
    assert_eq!((scale.anchors[3].y, scale.anchors[3].x), (24, 24));
    assert_eq!(scale.anchors[3].scale_index, 0);
}

#[test]
fn test_streaming_matches_whole_video_with_overlap() {
    let config = ExtractorConfig {
        scales: vec![1.0, 0.707, 0.5],
        local_duration: 5,
        t_step: 2,
        x_step: 5,
        y_step: 5,
        ..small_config()
    };
    let frames = noise_video(36, 30, 21, 11);
    let extractor = LocalFeatureExtractor::new(&config).unwrap();
    let reference = extractor.extract_all(&frames).unwrap();
    let streamed = stream_all(&config, frames);
    assert_eq!(reference.len(), 9);
    assert_windows_equal(&streamed, &reference);
}

#[test]
fn test_streaming_matches_whole_video_without_overlap() {
    let config = ExtractorConfig {
        scales: vec![1.0, 0.5],
        t_step: 4,
        ..small_config()
    };
    let frames = noise_video(32, 32, 19, 5);
    let extractor = LocalFeatureExtractor::new(&config).unwrap();
    let reference = extractor.extract_all(&frames).unwrap();
    let streamed = stream_all(&config, frames);
    assert_eq!(reference.len(), 5);
    assert_windows_equal(&streamed, &reference);
}

#[test]
fn test_max_pooling_never_below_average() {
    let frames = noise_video(24, 24, 3, 9);
    let average = stream_all(&small_config(), frames.clone());
    let max = stream_all(
        &ExtractorConfig {
            pooling: PoolingType::Max,
            ..small_config()
        },
        frames,
    );
    let a = &average[0].scales[0].descriptors[0];
    let m = &max[0].scales[0].descriptors[0];
    for (avg, mx) in a.values().iter().zip(m.values()) {
        assert!(mx >= avg, "max {} below average {}", mx, avg);
    }
}

#[test]
fn test_flow_channels_extend_descriptor() {
    let config = ExtractorConfig {
        channels: vec![Channel::Intensity, Channel::FlowX, Channel::FlowY],
        ..small_config()
    };
    let extractor = LocalFeatureExtractor::new(&config).unwrap();
    assert_eq!(extractor.descriptor_len(), 3 * 27);
    let windows = stream_all(&config, MovingSquare::default().render(4).frames);
    assert_eq!(windows[0].scales[0].descriptors[0].shape(), (3, 27));
}
