//! Forest persistence through the detection path
//!
//! A forest trained on real extracted descriptors is saved, loaded and used
//! for detection; the loaded forest must route every descriptor to the same
//! leaves and produce the same vote bands as the forest it was saved from.

use action_forest::config::{ExtractorConfig, ForestConfig, VotingConfig};
use action_forest::detection::{Detector, VoteBand};
use action_forest::error::{ErrorCode, PersistenceError, PersistenceErrorCodes};
use action_forest::features::{Channel, ExtractionWindow, LocalFeatureExtractor, PoolingType};
use action_forest::forest::{CriterionKind, DecisionForest};
use action_forest::sampling::SampleSelector;
use action_forest::testing::{MovingSquare, SyntheticClip};

fn extractor_config() -> ExtractorConfig {
    ExtractorConfig {
        scales: vec![1.0, 0.5],
        local_width: 9,
        local_height: 9,
        local_duration: 3,
        x_block_size: 3,
        y_block_size: 3,
        t_block_size: 3,
        x_step: 4,
        y_step: 4,
        t_step: 2,
        pooling: PoolingType::Max,
        channels: Channel::DEFAULT.to_vec(),
        flow_window_radius: 2,
    }
}

fn forest_config() -> ForestConfig {
    ForestConfig {
        n_classes: 2,
        n_trees: 4,
        bootstrap_ratio: 0.8,
        max_depth: 10,
        min_data: 4,
        n_splits: 20,
        n_thresholds: 6,
        negative_class: Some(1),
        criterion: CriterionKind::Alternating,
        seed: 21,
        n_threads: 2,
    }
}

fn voting_config() -> VotingConfig {
    VotingConfig {
        discretize_ratio: 0.5,
        delete_step: 4,
        buffer_length: 8,
        invalid_leaf_size_threshold: Some(200),
        trace_contributions: true,
    }
}

fn clip_and_windows() -> (SyntheticClip, Vec<ExtractionWindow>) {
    let clip = MovingSquare::default().render(30);
    let windows = LocalFeatureExtractor::new(&extractor_config())
        .unwrap()
        .extract_all(&clip.frames)
        .unwrap();
    (clip, windows)
}

fn train(clip: &SyntheticClip, windows: &[ExtractionWindow]) -> DecisionForest {
    let mut selector = SampleSelector::new(15, 4);
    let mut samples = Vec::new();
    for window in windows {
        let volume = clip
            .volume(window.begin_t, window.begin_t + 3)
            .expect("window inside the clip");
        samples.extend(selector.positives(window, &volume, 0));
        samples.extend(selector.negatives(window, &[volume], 1));
    }
    DecisionForest::train(&samples, &forest_config()).unwrap()
}

fn detect(forest: DecisionForest, windows: &[ExtractionWindow]) -> Vec<VoteBand> {
    let mut detector =
        Detector::new(forest, &extractor_config(), (64, 64), &voting_config()).unwrap();
    let mut bands = Vec::new();
    for window in windows {
        bands.extend(detector.process_window(window));
    }
    bands.extend(detector.finish());
    bands
}

#[test]
fn test_loaded_forest_detects_identically() {
    let (clip, windows) = clip_and_windows();
    let forest = train(&clip, &windows);

    let path = std::env::temp_dir().join(format!(
        "action_forest_persistence_{}.json",
        std::process::id()
    ));
    forest.save(&path).unwrap();
    let loaded = DecisionForest::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, forest);
    for window in &windows {
        for scale in &window.scales {
            for descriptor in &scale.descriptors {
                assert_eq!(
                    loaded.leaf_indices(descriptor),
                    forest.leaf_indices(descriptor)
                );
            }
        }
    }

    let original_bands = detect(forest, &windows);
    assert!(original_bands.iter().any(|band| !band.is_empty()));
    assert_eq!(detect(loaded, &windows), original_bands);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = DecisionForest::load("/nonexistent/action_forest/forest.json").unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
    assert_eq!(err.code(), PersistenceErrorCodes::IO);
}

#[test]
fn test_forest_with_wrong_tree_count_is_rejected() {
    let (clip, windows) = clip_and_windows();
    let forest = train(&clip, &windows);
    let mut value: serde_json::Value = serde_json::from_str(&forest.to_json().unwrap()).unwrap();
    value["config"]["n_trees"] = serde_json::json!(7);
    let err = DecisionForest::from_json(&value.to_string()).unwrap_err();
    assert_eq!(err.code(), PersistenceErrorCodes::INVALID_STRUCTURE);
}
