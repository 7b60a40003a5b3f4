// VoteCaster - leaf statistics to weighted Hough votes
//
// Every tree contributes, for each positive class present in the reached
// leaf, one vote of weight `p(class | leaf) / n_trees` at the descriptor
// anchor displaced by the class's mean offset. Spatial offsets are stored
// in the pixel units of the scale the descriptor was sampled at, so they
// are divided by that scale before being added to the un-scaled anchor.

use crate::config::VotingConfig;
use crate::forest::{DecisionForest, LeafStats};
use crate::types::SpatioTemporalAnchor;

/// One weighted vote with its provenance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub class: usize,
    pub tree: usize,
    /// Predicted action center `[t, y, x]` in frame coordinates
    pub point: [f32; 3],
    pub scale_index: usize,
    pub weight: f32,
    pub anchor: SpatioTemporalAnchor,
}

#[derive(Debug, Clone)]
pub struct VoteCaster {
    n_classes: usize,
    n_trees: usize,
    negative_class: Option<usize>,
    scales: Vec<f64>,
    invalid_leaf_size_threshold: Option<usize>,
}

impl VoteCaster {
    pub fn new(forest: &DecisionForest, scales: &[f64], config: &VotingConfig) -> Self {
        Self {
            n_classes: forest.n_classes(),
            n_trees: forest.n_trees().max(1),
            negative_class: forest.negative_class(),
            scales: scales.to_vec(),
            invalid_leaf_size_threshold: config.invalid_leaf_size_threshold,
        }
    }

    /// Votes cast by one descriptor
    ///
    /// # Arguments
    /// * `anchor` - Descriptor anchor in un-scaled frame coordinates
    /// * `leaves` - Leaf reached in each tree, in tree order
    pub fn cast(&self, anchor: SpatioTemporalAnchor, leaves: &[&LeafStats]) -> Vec<Vote> {
        let scale = self
            .scales
            .get(anchor.scale_index)
            .copied()
            .unwrap_or(1.0) as f32;
        let [t, y, x] = anchor.position();
        let mut votes = Vec::new();

        for (tree, leaf) in leaves.iter().enumerate() {
            if self.is_oversized(leaf) {
                continue;
            }
            for class in 0..self.n_classes.min(leaf.n_classes()) {
                if self.negative_class == Some(class) {
                    continue;
                }
                let probability = leaf.class_probability(class);
                if probability <= 0.0 {
                    continue;
                }
                let Some(&[dt, dy, dx]) = leaf.offset_means.get(class) else {
                    continue;
                };
                votes.push(Vote {
                    class,
                    tree,
                    point: [t + dt, y + dy / scale, x + dx / scale],
                    scale_index: anchor.scale_index,
                    weight: probability / self.n_trees as f32,
                    anchor,
                });
            }
        }
        votes
    }

    /// Classes that receive votes, in ascending order
    pub fn positive_classes(&self) -> Vec<usize> {
        (0..self.n_classes)
            .filter(|&class| self.negative_class != Some(class))
            .collect()
    }

    /// Leaves that absorbed too many samples carry no location information
    fn is_oversized(&self, leaf: &LeafStats) -> bool {
        self.invalid_leaf_size_threshold
            .map_or(false, |threshold| leaf.n_samples > threshold)
    }
}
