// Training sample selection from extraction windows
//
// Positives are descriptors whose anchor lies inside an annotated action
// volume; their offset points from the anchor to the volume center.
// Negatives are drawn at random from anchors outside every annotated
// volume. At most `n_per_window` samples are kept per scale and window,
// chosen with a seeded RNG so a run is reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::ExtractionWindow;
use crate::forest::TrainingSample;
use crate::types::{SpatioTemporalAnchor, SpatioTemporalVolume};

/// Displacement from `anchor` to the center of `volume`
///
/// The spatial components are expressed in the pixel units of the scale the
/// descriptor was sampled at (`scale` times the un-scaled displacement), which
/// is what vote casting divides back out.
pub fn action_offset(
    anchor: &SpatioTemporalAnchor,
    scale: f64,
    volume: &SpatioTemporalVolume,
) -> [f32; 3] {
    let [ct, cy, cx] = volume.center();
    let [t, y, x] = anchor.position();
    let scale = scale as f32;
    [ct - t, (cy - y) * scale, (cx - x) * scale]
}

/// True when the anchor center falls inside the volume
pub fn volume_contains(volume: &SpatioTemporalVolume, anchor: &SpatioTemporalAnchor) -> bool {
    volume.contains(anchor.t as i32, anchor.y as i32, anchor.x as i32)
}

/// Seeded per-window sample selector
pub struct SampleSelector {
    rng: StdRng,
    n_per_window: usize,
    next_index: usize,
}

impl SampleSelector {
    /// # Arguments
    /// * `n_per_window` - Maximum samples kept per scale and window
    /// * `seed` - RNG seed for the random subsets
    pub fn new(n_per_window: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_per_window,
            next_index: 0,
        }
    }

    /// Descriptors anchored inside `volume`, labeled `class`
    pub fn positives(
        &mut self,
        window: &ExtractionWindow,
        volume: &SpatioTemporalVolume,
        class: usize,
    ) -> Vec<TrainingSample> {
        self.select(window, class, |anchor, scale| {
            volume_contains(volume, anchor).then(|| action_offset(anchor, scale, volume))
        })
    }

    /// Descriptors anchored outside every volume, labeled `negative_class`
    /// with a zero offset
    pub fn negatives(
        &mut self,
        window: &ExtractionWindow,
        volumes: &[SpatioTemporalVolume],
        negative_class: usize,
    ) -> Vec<TrainingSample> {
        self.select(window, negative_class, |anchor, _| {
            (!volumes.iter().any(|v| volume_contains(v, anchor))).then_some([0.0; 3])
        })
    }

    /// Random subset per scale of the descriptors `offset_of` accepts
    fn select<F>(&mut self, window: &ExtractionWindow, class: usize, offset_of: F) -> Vec<TrainingSample>
    where
        F: Fn(&SpatioTemporalAnchor, f64) -> Option<[f32; 3]>,
    {
        let mut samples = Vec::new();
        for scale in &window.scales {
            let mut candidates: Vec<(usize, [f32; 3])> = scale
                .anchors
                .iter()
                .enumerate()
                .filter_map(|(i, anchor)| offset_of(anchor, scale.scale).map(|offset| (i, offset)))
                .collect();
            candidates.shuffle(&mut self.rng);
            candidates.truncate(self.n_per_window);
            for (i, offset) in candidates {
                samples.push(
                    TrainingSample::new(scale.descriptors[i].clone(), class, offset)
                        .with_index(self.next_index),
                );
                self.next_index += 1;
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ScaleFeatures;
    use crate::types::{Descriptor, Rect};

    fn anchor(t: usize, y: usize, x: usize) -> SpatioTemporalAnchor {
        SpatioTemporalAnchor {
            t,
            y,
            x,
            scale_index: 0,
        }
    }

    /// 10x10 grid of anchors at t = 5, descriptor value = anchor x
    fn window(scale: f64) -> ExtractionWindow {
        let mut anchors = Vec::new();
        let mut descriptors = Vec::new();
        for y in 0..10 {
            for x in 0..10 {
                anchors.push(anchor(5, y * 4, x * 4));
                descriptors.push(Descriptor::new(vec![(x * 4) as f32], 1));
            }
        }
        ExtractionWindow {
            begin_t: 4,
            frame_size: (40, 40),
            scales: vec![ScaleFeatures {
                scale_index: 0,
                scale,
                anchors,
                descriptors,
            }],
            color_frames: Vec::new(),
            color_begin_t: 4,
        }
    }

    fn volume() -> SpatioTemporalVolume {
        SpatioTemporalVolume::new(Rect::new(8, 8, 10, 10), 0, 10).unwrap()
    }

    #[test]
    fn test_offset_points_to_volume_center() {
        // center (t, y, x) = (5, 13, 13)
        assert_eq!(action_offset(&anchor(3, 10, 16), 1.0, &volume()), [2.0, 3.0, -3.0]);
        assert_eq!(action_offset(&anchor(3, 10, 16), 0.5, &volume()), [2.0, 1.5, -1.5]);
    }

    #[test]
    fn test_positives_lie_inside_the_volume() {
        let mut selector = SampleSelector::new(100, 1);
        let samples = selector.positives(&window(1.0), &volume(), 2);
        // y, x in {8, 12, 16}
        assert_eq!(samples.len(), 9);
        for sample in &samples {
            assert_eq!(sample.class, 2);
            let x = sample.descriptor.value(0, 0);
            assert!((8.0..18.0).contains(&x));
            assert_eq!(sample.offset[2], 13.0 - x);
        }
    }

    #[test]
    fn test_negatives_avoid_every_volume() {
        let mut selector = SampleSelector::new(1000, 2);
        let samples = selector.negatives(&window(1.0), &[volume()], 6);
        assert_eq!(samples.len(), 91);
        assert!(samples.iter().all(|s| s.class == 6 && s.offset == [0.0; 3]));
    }

    #[test]
    fn test_selection_is_capped_and_reproducible() {
        let pick = |seed| {
            SampleSelector::new(7, seed)
                .negatives(&window(1.0), &[volume()], 1)
                .into_iter()
                .map(|s| s.descriptor)
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(3).len(), 7);
        assert_eq!(pick(3), pick(3));
    }

    #[test]
    fn test_sample_indices_keep_counting_across_windows() {
        let mut selector = SampleSelector::new(2, 4);
        let first = selector.negatives(&window(1.0), &[], 0);
        let second = selector.negatives(&window(1.0), &[], 0);
        let indices: Vec<usize> = first.iter().chain(&second).map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
