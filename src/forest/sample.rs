// Labeled training sample

use serde::{Deserialize, Serialize};

use crate::types::Descriptor;

/// Descriptor with its class label and displacement to the action center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub descriptor: Descriptor,
    pub class: usize,
    /// `[t, y, x]` from the descriptor anchor to the action center; zero for negatives
    pub offset: [f32; 3],
    /// Caller bookkeeping (e.g. position in the source dataset)
    #[serde(default)]
    pub index: usize,
}

impl TrainingSample {
    pub fn new(descriptor: Descriptor, class: usize, offset: [f32; 3]) -> Self {
        Self {
            descriptor,
            class,
            offset,
            index: 0,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}
