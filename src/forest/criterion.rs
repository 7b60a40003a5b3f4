// Split criteria - purity measures for candidate partitions
//
// A criterion scores a (left, right) partition; lower is better. The
// Hough-forest setup alternates between class uncertainty and offset
// uncertainty at random per node, so node-level selection is a separate
// policy trait.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sample::TrainingSample;

/// Partition score; lower is purer
pub trait SplitCriterion: Send + Sync {
    fn score(&self, left: &[&TrainingSample], right: &[&TrainingSample]) -> f64;
}

/// Chooses the criterion used at one node
pub trait CriterionPolicy: Send + Sync {
    fn select<'a>(
        &'a self,
        samples: &[&TrainingSample],
        rng: &mut StdRng,
    ) -> &'a dyn SplitCriterion;
}

/// Built-in criterion selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionKind {
    ClassEntropy,
    /// Offset variance wherever a node holds positives, class entropy elsewhere
    OffsetVariance,
    /// Class entropy or offset variance, picked at random per node
    Alternating,
}

impl CriterionKind {
    pub fn build(&self, n_classes: usize, negative_class: Option<usize>) -> Box<dyn CriterionPolicy> {
        let class_entropy = ClassEntropy { n_classes };
        let offset_variance = OffsetVariance {
            n_classes,
            negative_class,
        };
        match self {
            CriterionKind::ClassEntropy => Box::new(class_entropy),
            CriterionKind::OffsetVariance => Box::new(Alternating {
                class_entropy,
                offset_variance,
                offset_probability: 1.0,
            }),
            CriterionKind::Alternating => Box::new(Alternating {
                class_entropy,
                offset_variance,
                offset_probability: 0.5,
            }),
        }
    }
}

/// Size-weighted Shannon entropy of the class labels
#[derive(Debug, Clone, Copy)]
pub struct ClassEntropy {
    pub n_classes: usize,
}

impl ClassEntropy {
    fn weighted_entropy(&self, samples: &[&TrainingSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut counts = vec![0usize; self.n_classes];
        for sample in samples {
            counts[sample.class] += 1;
        }
        let n = samples.len() as f64;
        let entropy: f64 = counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum();
        n * entropy
    }
}

impl SplitCriterion for ClassEntropy {
    fn score(&self, left: &[&TrainingSample], right: &[&TrainingSample]) -> f64 {
        self.weighted_entropy(left) + self.weighted_entropy(right)
    }
}

impl CriterionPolicy for ClassEntropy {
    fn select<'a>(&'a self, _: &[&TrainingSample], _: &mut StdRng) -> &'a dyn SplitCriterion {
        self
    }
}

/// Sum of squared distances of positive offsets to their class mean
///
/// Negative-class samples carry no meaningful offset and are skipped.
#[derive(Debug, Clone, Copy)]
pub struct OffsetVariance {
    pub n_classes: usize,
    pub negative_class: Option<usize>,
}

impl OffsetVariance {
    fn is_positive(&self, sample: &TrainingSample) -> bool {
        self.negative_class != Some(sample.class)
    }

    fn sum_squared_error(&self, samples: &[&TrainingSample]) -> f64 {
        let mut counts = vec![0usize; self.n_classes];
        let mut sums = vec![[0.0f64; 3]; self.n_classes];
        let mut squares = vec![0.0f64; self.n_classes];
        for sample in samples.iter().filter(|s| self.is_positive(s)) {
            counts[sample.class] += 1;
            for axis in 0..3 {
                let v = sample.offset[axis] as f64;
                sums[sample.class][axis] += v;
                squares[sample.class] += v * v;
            }
        }
        (0..self.n_classes)
            .filter(|&c| counts[c] > 0)
            .map(|c| {
                let norm: f64 = sums[c].iter().map(|s| s * s).sum();
                squares[c] - norm / counts[c] as f64
            })
            .sum()
    }
}

impl SplitCriterion for OffsetVariance {
    fn score(&self, left: &[&TrainingSample], right: &[&TrainingSample]) -> f64 {
        self.sum_squared_error(left) + self.sum_squared_error(right)
    }
}

/// Random per-node choice between class entropy and offset variance
///
/// Nodes without any positive sample always use class entropy.
#[derive(Debug, Clone, Copy)]
pub struct Alternating {
    pub class_entropy: ClassEntropy,
    pub offset_variance: OffsetVariance,
    /// Probability of choosing offset variance at a node with positives
    pub offset_probability: f64,
}

impl CriterionPolicy for Alternating {
    fn select<'a>(
        &'a self,
        samples: &[&TrainingSample],
        rng: &mut StdRng,
    ) -> &'a dyn SplitCriterion {
        let has_positive = samples.iter().any(|s| self.offset_variance.is_positive(s));
        let criterion: &dyn SplitCriterion =
            if has_positive && rng.gen_bool(self.offset_probability) {
                &self.offset_variance
            } else {
                &self.class_entropy
            };
        criterion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Descriptor;
    use rand::SeedableRng;

    fn sample(class: usize, offset: [f32; 3]) -> TrainingSample {
        TrainingSample::new(Descriptor::new(vec![0.0], 1), class, offset)
    }

    #[test]
    fn test_pure_partition_has_zero_entropy() {
        let a = sample(0, [0.0; 3]);
        let b = sample(1, [0.0; 3]);
        let criterion = ClassEntropy { n_classes: 2 };
        assert_eq!(criterion.score(&[&a, &a], &[&b, &b]), 0.0);
        // Mixed partition: 2 * ln 2 on each side
        let mixed = criterion.score(&[&a, &b], &[&a, &b]);
        assert!((mixed - 4.0 * 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_offset_variance_ignores_negatives() {
        let criterion = OffsetVariance {
            n_classes: 2,
            negative_class: Some(1),
        };
        let p1 = sample(0, [0.0, 0.0, 0.0]);
        let p2 = sample(0, [0.0, 2.0, 0.0]);
        let n = sample(1, [50.0, 50.0, 50.0]);
        // Positives deviate by 1 from their mean on y: SSE 2
        assert!((criterion.score(&[&p1, &p2, &n], &[]) - 2.0).abs() < 1e-9);
        assert_eq!(criterion.score(&[&n, &n], &[&p1]), 0.0);
    }

    #[test]
    fn test_alternating_falls_back_to_entropy_without_positives() {
        let policy = Alternating {
            class_entropy: ClassEntropy { n_classes: 2 },
            offset_variance: OffsetVariance {
                n_classes: 2,
                negative_class: Some(1),
            },
            offset_probability: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let negative = sample(1, [0.0; 3]);
        let positive = sample(0, [0.0, 4.0, 0.0]);
        let other = sample(0, [0.0, 0.0, 0.0]);

        // A lone positive has no offset spread, so only entropy scores the mix above zero
        let chosen = policy.select(&[&negative], &mut rng);
        assert!(chosen.score(&[&positive, &negative], &[]) > 0.0);

        let chosen = policy.select(&[&positive, &other], &mut rng);
        assert!((chosen.score(&[&positive, &other], &[]) - 8.0).abs() < 1e-9);
    }
}
