// DecisionTree - arena-allocated binary tree with leaf statistics
//
// Nodes live in a Vec and refer to their children by index. Training uses
// an explicit work stack, so deep trees never recurse. After training,
// leaves are renumbered in depth-first pre-order (left before right) and
// the leaf table is stored in that order.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Descriptor;

use super::criterion::CriterionPolicy;
use super::leaf::LeafStats;
use super::sample::TrainingSample;

/// Tree node: split rule or pointer into the leaf table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// `descriptor.value(channel, dimension) < threshold` goes left
    Split {
        channel: usize,
        dimension: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf { index: usize },
}

/// Growth limits for one tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub n_classes: usize,
    pub max_depth: usize,
    pub min_data: usize,
    pub n_splits: usize,
    pub n_thresholds: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    leaves: Vec<LeafStats>,
}

struct BestSplit {
    channel: usize,
    dimension: usize,
    threshold: f32,
    score: f64,
}

impl DecisionTree {
    /// Grow a tree on `samples`
    ///
    /// # Arguments
    /// * `samples` - Bootstrap sample; must be non-empty with a uniform descriptor shape
    /// * `params` - Depth, size and candidate limits
    /// * `policy` - Criterion selection per node
    /// * `rng` - Source of candidate splits and thresholds
    pub fn train(
        samples: &[&TrainingSample],
        params: &TreeParams,
        policy: &dyn CriterionPolicy,
        rng: &mut StdRng,
    ) -> Self {
        let (n_channels, channel_len) = samples
            .first()
            .map(|s| s.descriptor.shape())
            .unwrap_or((0, 0));

        let mut tree = Self {
            nodes: vec![Node::Leaf { index: 0 }],
            leaves: Vec::new(),
        };
        let mut stack: Vec<(usize, Vec<&TrainingSample>, usize)> = vec![(0, samples.to_vec(), 0)];

        while let Some((node_id, node_samples, depth)) = stack.pop() {
            let split = if depth >= params.max_depth
                || node_samples.len() < params.min_data
                || n_channels == 0
                || channel_len == 0
            {
                None
            } else {
                find_split(&node_samples, params, policy, rng, n_channels, channel_len)
            };

            match split {
                Some(best) => {
                    let (left_samples, right_samples): (Vec<&TrainingSample>, Vec<&TrainingSample>) =
                        node_samples.iter().partition(|s| {
                            s.descriptor.value(best.channel, best.dimension) < best.threshold
                        });
                    let left = tree.nodes.len();
                    let right = left + 1;
                    tree.nodes.push(Node::Leaf { index: 0 });
                    tree.nodes.push(Node::Leaf { index: 0 });
                    tree.nodes[node_id] = Node::Split {
                        channel: best.channel,
                        dimension: best.dimension,
                        threshold: best.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_samples, depth + 1));
                    stack.push((left, left_samples, depth + 1));
                }
                None => {
                    tree.nodes[node_id] = Node::Leaf {
                        index: tree.leaves.len(),
                    };
                    tree.leaves
                        .push(LeafStats::from_samples(&node_samples, params.n_classes));
                }
            }
        }

        tree.number_leaves();
        tree
    }

    /// Reassign leaf indices in pre-order and reorder the leaf table to match
    fn number_leaves(&mut self) {
        let mut order = Vec::with_capacity(self.leaves.len());
        let mut stack = vec![0usize];
        while let Some(node_id) = stack.pop() {
            match &mut self.nodes[node_id] {
                Node::Split { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
                Node::Leaf { index } => {
                    order.push(*index);
                    *index = order.len() - 1;
                }
            }
        }
        let mut old: Vec<Option<LeafStats>> = self.leaves.drain(..).map(Some).collect();
        self.leaves = order
            .into_iter()
            .filter_map(|old_index| old.get_mut(old_index).and_then(Option::take))
            .collect();
    }

    /// Index into the leaf table reached by `descriptor`
    pub fn leaf_index(&self, descriptor: &Descriptor) -> usize {
        let mut node_id = 0;
        loop {
            match &self.nodes[node_id] {
                Node::Split {
                    channel,
                    dimension,
                    threshold,
                    left,
                    right,
                } => {
                    node_id = if descriptor.value(*channel, *dimension) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { index } => return *index,
            }
        }
    }

    pub fn predict(&self, descriptor: &Descriptor) -> &LeafStats {
        &self.leaves[self.leaf_index(descriptor)]
    }

    pub fn leaf(&self, index: usize) -> Option<&LeafStats> {
        self.leaves.get(index)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path, in edges
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node_id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[node_id] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }

    /// Check arena links and leaf numbering after deserialization
    ///
    /// # Returns
    /// * `Err(String)` - first violated invariant
    pub fn validate(&self, n_classes: usize, shape: (usize, usize)) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut next_leaf = 0;
        let mut stack = vec![0usize];
        while let Some(node_id) = stack.pop() {
            let Some(node) = self.nodes.get(node_id) else {
                return Err(format!("child index {} out of range", node_id));
            };
            if std::mem::replace(&mut visited[node_id], true) {
                return Err(format!("node {} reachable twice", node_id));
            }
            match node {
                Node::Split {
                    channel,
                    dimension,
                    left,
                    right,
                    ..
                } => {
                    if *channel >= shape.0 || *dimension >= shape.1 {
                        return Err(format!(
                            "split on ({}, {}) outside descriptor shape {:?}",
                            channel, dimension, shape
                        ));
                    }
                    stack.push(*right);
                    stack.push(*left);
                }
                Node::Leaf { index } => {
                    if *index != next_leaf {
                        return Err(format!(
                            "leaf index {} where pre-order expects {}",
                            index, next_leaf
                        ));
                    }
                    next_leaf += 1;
                }
            }
        }
        if next_leaf != self.leaves.len() {
            return Err(format!(
                "{} leaves reachable but {} stored",
                next_leaf,
                self.leaves.len()
            ));
        }
        if visited.iter().any(|v| !v) {
            return Err("unreachable nodes in arena".to_string());
        }
        for (index, leaf) in self.leaves.iter().enumerate() {
            leaf.check_consistency(n_classes)
                .map_err(|reason| format!("leaf {}: {}", index, reason))?;
        }
        Ok(())
    }
}

/// Draw candidate splits and keep the best-scoring one
///
/// Returns `None` when every candidate dimension is constant or every
/// threshold leaves one side empty.
fn find_split(
    samples: &[&TrainingSample],
    params: &TreeParams,
    policy: &dyn CriterionPolicy,
    rng: &mut StdRng,
    n_channels: usize,
    channel_len: usize,
) -> Option<BestSplit> {
    let criterion = policy.select(samples, rng);
    let mut best: Option<BestSplit> = None;

    for _ in 0..params.n_splits {
        let channel = rng.gen_range(0..n_channels);
        let dimension = rng.gen_range(0..channel_len);

        let (min, max) = samples.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
            let v = s.descriptor.value(channel, dimension);
            (lo.min(v), hi.max(v))
        });
        if !(min.is_finite() && max.is_finite() && (max - min).is_finite() && max > min) {
            continue;
        }

        for _ in 0..params.n_thresholds {
            let threshold = rng.gen_range(min..max);
            let (left, right): (Vec<&TrainingSample>, Vec<&TrainingSample>) = samples
                .iter()
                .partition(|s| s.descriptor.value(channel, dimension) < threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let score = criterion.score(&left, &right);
            if best.as_ref().map_or(true, |b| score < b.score) {
                best = Some(BestSplit {
                    channel,
                    dimension,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
