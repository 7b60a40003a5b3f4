// DecisionForest - randomized Hough forest over pooled descriptors
//
// Each tree is grown on its own bootstrap sample with its own RNG, seeded
// from the forest seed and the tree index, so a fixed seed reproduces the
// same forest regardless of how trees are spread over worker threads.
//
// Module organization:
// - sample: Labeled training sample
// - leaf: Class histogram and offset statistics per leaf
// - criterion: Split criteria and per-node criterion policies
// - tree: Arena tree, explicit-stack training, pre-order leaf numbering
// - persistence: JSON save/load with structural validation
// - mod.rs: Coordinator (DecisionForest)

mod criterion;
mod leaf;
mod persistence;
mod sample;
mod tree;

pub use criterion::{
    Alternating, ClassEntropy, CriterionKind, CriterionPolicy, OffsetVariance, SplitCriterion,
};
pub use leaf::LeafStats;
pub use sample::TrainingSample;
pub use tree::{DecisionTree, Node, TreeParams};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::error::{log_training_error, TrainingError};
use crate::types::Descriptor;

/// Trained forest; read-only after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionForest {
    config: ForestConfig,
    /// `(n_channels, channel_len)` of the training descriptors
    descriptor_shape: (usize, usize),
    trees: Vec<DecisionTree>,
}

impl DecisionForest {
    /// Train with the criterion named in `config`
    ///
    /// # Returns
    /// * `Err(TrainingError)` - invalid configuration, empty or inconsistent
    ///   training data, or a bootstrap ratio that yields no samples
    pub fn train(samples: &[TrainingSample], config: &ForestConfig) -> Result<Self, TrainingError> {
        let policy = config
            .criterion
            .build(config.n_classes, config.negative_class);
        let result = Self::train_with_policy(samples, config, policy.as_ref());
        if let Err(err) = &result {
            log_training_error(err, "train");
        }
        result
    }

    /// Train with a caller-supplied criterion policy
    pub fn train_with_policy(
        samples: &[TrainingSample],
        config: &ForestConfig,
        policy: &dyn CriterionPolicy,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        let descriptor_shape = check_samples(samples, config.n_classes)?;

        let n_bootstrap = (config.bootstrap_ratio * samples.len() as f64).round() as usize;
        if n_bootstrap == 0 {
            return Err(TrainingError::EmptyBootstrap {
                ratio: config.bootstrap_ratio,
                n_samples: samples.len(),
            });
        }

        let params = TreeParams {
            n_classes: config.n_classes,
            max_depth: config.max_depth,
            min_data: config.min_data,
            n_splits: config.n_splits,
            n_thresholds: config.n_thresholds,
        };
        let n_workers = config.n_threads.min(config.n_trees).max(1);
        log::info!(
            "[Forest] Training {} trees on {} samples ({} per bootstrap, {} threads)",
            config.n_trees,
            samples.len(),
            n_bootstrap,
            n_workers
        );

        let mut trained: Vec<(usize, DecisionTree)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..n_workers)
                .map(|worker| {
                    let params = &params;
                    scope.spawn(move || {
                        (worker..config.n_trees)
                            .step_by(n_workers)
                            .map(|tree_index| {
                                let tree = train_tree(
                                    samples,
                                    n_bootstrap,
                                    config.seed,
                                    tree_index,
                                    params,
                                    policy,
                                );
                                (tree_index, tree)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(trees) => trees,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        trained.sort_by_key(|(index, _)| *index);

        let trees: Vec<DecisionTree> = trained.into_iter().map(|(_, tree)| tree).collect();
        log::info!(
            "[Forest] Trained {} trees, {} leaves total",
            trees.len(),
            trees.iter().map(DecisionTree::n_leaves).sum::<usize>()
        );

        Ok(Self {
            config: config.clone(),
            descriptor_shape,
            trees,
        })
    }

    /// Route `descriptor` through every tree
    ///
    /// # Returns
    /// One leaf per tree, in tree order
    pub fn predict(&self, descriptor: &Descriptor) -> Vec<&LeafStats> {
        self.trees
            .iter()
            .map(|tree| tree.predict(descriptor))
            .collect()
    }

    /// Leaf index reached in each tree
    pub fn leaf_indices(&self, descriptor: &Descriptor) -> Vec<usize> {
        self.trees
            .iter()
            .map(|tree| tree.leaf_index(descriptor))
            .collect()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_classes(&self) -> usize {
        self.config.n_classes
    }

    pub fn negative_class(&self) -> Option<usize> {
        self.config.negative_class
    }

    pub fn descriptor_shape(&self) -> (usize, usize) {
        self.descriptor_shape
    }
}

fn train_tree(
    samples: &[TrainingSample],
    n_bootstrap: usize,
    seed: u64,
    tree_index: usize,
    params: &TreeParams,
    policy: &dyn CriterionPolicy,
) -> DecisionTree {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_index as u64));
    let bootstrap: Vec<&TrainingSample> = (0..n_bootstrap)
        .map(|_| &samples[rng.gen_range(0..samples.len())])
        .collect();
    let tree = DecisionTree::train(&bootstrap, params, policy, &mut rng);
    tracing::debug!(
        "[ForestWorker] Tree {} grown: {} nodes, {} leaves, depth {}",
        tree_index,
        tree.n_nodes(),
        tree.n_leaves(),
        tree.depth()
    );
    tree
}

/// Check labels and descriptor shapes; returns the common shape
fn check_samples(
    samples: &[TrainingSample],
    n_classes: usize,
) -> Result<(usize, usize), TrainingError> {
    let first = samples.first().ok_or(TrainingError::EmptyTrainingSet)?;
    let shape = first.descriptor.shape();
    let mut counts = vec![0usize; n_classes];
    for sample in samples {
        if sample.descriptor.shape() != shape {
            return Err(TrainingError::DescriptorMismatch {
                expected: shape,
                found: sample.descriptor.shape(),
            });
        }
        if sample.class >= n_classes {
            return Err(TrainingError::LabelOutOfRange {
                label: sample.class,
                n_classes,
            });
        }
        counts[sample.class] += 1;
    }
    if let Some(label) = counts.iter().position(|&c| c == 0) {
        return Err(TrainingError::EmptyClass { label });
    }
    Ok(shape)
}

#[cfg(test)]
#[path = "forest_tests.rs"]
mod tests;
