// Leaf statistics stored at every terminal node

use serde::{Deserialize, Serialize};

use super::sample::TrainingSample;

/// Class histogram and per-class offset statistics of the samples that reached a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafStats {
    /// Sample count per class
    pub class_histogram: Vec<usize>,
    /// Mean `[t, y, x]` offset per class; zero for classes absent from the leaf
    pub offset_means: Vec<[f32; 3]>,
    /// Per-axis offset variance per class
    pub offset_variances: Vec<[f32; 3]>,
    pub n_samples: usize,
}

impl LeafStats {
    pub fn from_samples(samples: &[&TrainingSample], n_classes: usize) -> Self {
        let mut class_histogram = vec![0usize; n_classes];
        let mut sums = vec![[0.0f64; 3]; n_classes];
        let mut squares = vec![[0.0f64; 3]; n_classes];
        for sample in samples {
            class_histogram[sample.class] += 1;
            for axis in 0..3 {
                let v = sample.offset[axis] as f64;
                sums[sample.class][axis] += v;
                squares[sample.class][axis] += v * v;
            }
        }

        let mut offset_means = vec![[0.0f32; 3]; n_classes];
        let mut offset_variances = vec![[0.0f32; 3]; n_classes];
        for class in 0..n_classes {
            let count = class_histogram[class];
            if count == 0 {
                continue;
            }
            for axis in 0..3 {
                let mean = sums[class][axis] / count as f64;
                let variance = (squares[class][axis] / count as f64 - mean * mean).max(0.0);
                offset_means[class][axis] = mean as f32;
                offset_variances[class][axis] = variance as f32;
            }
        }

        Self {
            class_histogram,
            offset_means,
            offset_variances,
            n_samples: samples.len(),
        }
    }

    pub fn n_classes(&self) -> usize {
        self.class_histogram.len()
    }

    /// Fraction of the leaf's samples with label `class`
    pub fn class_probability(&self, class: usize) -> f32 {
        if self.n_samples == 0 {
            return 0.0;
        }
        self.class_histogram.get(class).copied().unwrap_or(0) as f32 / self.n_samples as f32
    }

    /// Check the table shapes and sample count of a deserialized leaf
    pub fn check_consistency(&self, n_classes: usize) -> Result<(), String> {
        if self.class_histogram.len() != n_classes {
            return Err(format!(
                "leaf histogram has {} classes, expected {}",
                self.class_histogram.len(),
                n_classes
            ));
        }
        if self.offset_means.len() != n_classes || self.offset_variances.len() != n_classes {
            return Err(format!(
                "leaf offset tables have {}/{} classes, expected {}",
                self.offset_means.len(),
                self.offset_variances.len(),
                n_classes
            ));
        }
        let total: usize = self.class_histogram.iter().sum();
        if total != self.n_samples {
            return Err(format!(
                "leaf histogram sums to {} but n_samples is {}",
                total, self.n_samples
            ));
        }
        Ok(())
    }

    pub fn probabilities(&self) -> Vec<f32> {
        (0..self.n_classes())
            .map(|class| self.class_probability(class))
            .collect()
    }
}
