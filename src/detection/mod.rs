// Detection module - forest inference and Hough voting over extraction windows
//
// The detector owns the trained forest and one voting space per positive
// class. Every extraction window is routed through the forest, its votes
// are accumulated, and once the stream has moved past the end of the
// voting buffer the oldest band of cells is handed to the caller and
// evicted. Peak extraction on those bands happens outside this crate.
//
// Module organization:
// - pipeline: Sequential and two-thread drivers from frame source to bands
// - mod.rs: Detector and VoteBand

mod pipeline;

pub use pipeline::{run_pipelined, run_sequential, PipelineStats};

use serde::Serialize;

use crate::config::{ExtractorConfig, VotingConfig};
use crate::error::DetectionError;
use crate::features::ExtractionWindow;
use crate::forest::DecisionForest;
use crate::types::{ContributionPoint, DetectionResult, LocalMaximum};
use crate::voting::{VoteCaster, VoteCell, VotingSpace};

/// Cells of one class that left the voting window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteBand {
    pub class: usize,
    /// Band bounds in grid units, `[begin_t, end_t)`
    pub begin_t: usize,
    pub end_t: usize,
    /// Multiplier from frame coordinates to grid units
    pub discretize_ratio: f64,
    pub cells: Vec<VoteCell>,
    /// Parallel to `cells`; empty lists unless contribution tracing is on
    pub contributions: Vec<Vec<ContributionPoint>>,
}

impl VoteBand {
    /// Cell with the largest accumulated weight
    pub fn strongest(&self) -> Option<&VoteCell> {
        self.cells
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
    }

    /// `[t, y, x, scale]` of a cell in frame coordinates
    pub fn to_original(&self, cell: &VoteCell) -> [f32; 4] {
        let ratio = self.discretize_ratio as f32;
        [
            cell.point[0] / ratio,
            cell.point[1] / ratio,
            cell.point[2] / ratio,
            cell.point[3],
        ]
    }

    /// Strongest cell as a detection in frame coordinates, with its contributors
    pub fn strongest_detection(&self) -> Option<DetectionResult> {
        let position = self
            .cells
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
            .map(|(i, _)| i)?;
        let cell = &self.cells[position];
        Some(DetectionResult {
            class: self.class,
            maximum: LocalMaximum {
                point: self.to_original(cell),
                value: cell.weight,
            },
            contributions: self
                .contributions
                .get(position)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Forest inference plus per-class voting spaces
pub struct Detector {
    forest: DecisionForest,
    caster: VoteCaster,
    spaces: Vec<(usize, VotingSpace)>,
    windows_processed: usize,
    votes_cast: usize,
}

impl Detector {
    /// Build a detector for frames of `frame_size`
    ///
    /// # Arguments
    /// * `forest` - Trained forest; its descriptor shape must match the extractor's
    /// * `extractor` - Extractor configuration the windows will come from
    /// * `frame_size` - `(width, height)` of the un-scaled frames
    /// * `voting` - Discretization, eviction and tracing settings
    ///
    /// # Returns
    /// * `Err(DetectionError::Config)` - invalid extractor or voting configuration
    /// * `Err(DetectionError::ForestMismatch)` - descriptor shapes disagree
    pub fn new(
        forest: DecisionForest,
        extractor: &ExtractorConfig,
        frame_size: (u32, u32),
        voting: &VotingConfig,
    ) -> Result<Self, DetectionError> {
        let extractor = extractor.normalized()?;
        let extractor_shape = (extractor.channels.len(), extractor.blocks_per_channel());
        if forest.descriptor_shape() != extractor_shape {
            return Err(DetectionError::ForestMismatch {
                forest: forest.descriptor_shape(),
                extractor: extractor_shape,
            });
        }

        let width = voting.grid_extent(frame_size.0);
        let height = voting.grid_extent(frame_size.1);
        let caster = VoteCaster::new(&forest, &extractor.scales, voting);
        let spaces = caster
            .positive_classes()
            .into_iter()
            .map(|class| {
                VotingSpace::new(width, height, extractor.scales.clone(), voting)
                    .map(|space| (class, space))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "[Detector] {} classes voting on a {}x{} grid ({} trees)",
            spaces.len(),
            width,
            height,
            forest.n_trees()
        );

        Ok(Self {
            forest,
            caster,
            spaces,
            windows_processed: 0,
            votes_cast: 0,
        })
    }

    /// Route every descriptor of `window` and accumulate its votes
    ///
    /// # Returns
    /// Number of votes that landed inside a voting space
    pub fn cast_window(&mut self, window: &ExtractionWindow) -> usize {
        let mut stored = 0;
        for scale in &window.scales {
            for (anchor, descriptor) in scale.iter() {
                let leaves = self.forest.predict(descriptor);
                for vote in self.caster.cast(*anchor, &leaves) {
                    let Some((_, space)) = self.spaces.iter_mut().find(|(c, _)| *c == vote.class)
                    else {
                        continue;
                    };
                    if space.add_traced_vote(vote.point, vote.scale_index, vote.weight, vote.anchor)
                    {
                        stored += 1;
                    }
                }
            }
        }
        self.windows_processed += 1;
        self.votes_cast += stored;
        stored
    }

    /// Cast a window's votes and release every band the stream has moved past
    ///
    /// A band `[min_t, min_t + delete_step)` expires once the window start,
    /// in grid units, reaches the space's `max_t`.
    pub fn process_window(&mut self, window: &ExtractionWindow) -> Vec<VoteBand> {
        let stored = self.cast_window(window);
        log::debug!(
            "[Detector] Window begin_t={} cast {} votes",
            window.begin_t,
            stored
        );

        let ratio = self.discretize_ratio();
        let current_t = (window.begin_t as f64 * ratio).round() as usize;
        let mut bands = Vec::new();
        for (class, space) in &mut self.spaces {
            while current_t >= space.max_t() {
                bands.push(take_band(*class, space));
            }
        }
        bands
    }

    /// Release every remaining band at end of stream
    pub fn finish(&mut self) -> Vec<VoteBand> {
        let mut bands = Vec::new();
        for (class, space) in &mut self.spaces {
            while !space.is_empty() {
                space.skip_empty_bands();
                let band = take_band(*class, space);
                if !band.is_empty() {
                    bands.push(band);
                }
            }
        }
        log::info!(
            "[Detector] Finished: {} windows, {} votes",
            self.windows_processed,
            self.votes_cast
        );
        bands
    }

    /// Voting space of a positive class
    pub fn space(&self, class: usize) -> Option<&VotingSpace> {
        self.spaces
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, space)| space)
    }

    /// Classes that own a voting space
    pub fn classes(&self) -> Vec<usize> {
        self.spaces.iter().map(|(class, _)| *class).collect()
    }

    pub fn forest(&self) -> &DecisionForest {
        &self.forest
    }

    pub fn windows_processed(&self) -> usize {
        self.windows_processed
    }

    pub fn votes_cast(&self) -> usize {
        self.votes_cast
    }

    fn discretize_ratio(&self) -> f64 {
        self.spaces
            .first()
            .map_or(1.0, |(_, space)| space.discretize_ratio())
    }
}

/// Query the oldest band of `space` and evict it
fn take_band(class: usize, space: &mut VotingSpace) -> VoteBand {
    let begin_t = space.min_t();
    let end_t = begin_t.saturating_add(space.delete_step());
    let cells = space.query_range(begin_t, end_t);
    let contributions = cells
        .iter()
        .map(|cell| space.contributions(cell.index).to_vec())
        .collect();
    space.evict_expired();
    VoteBand {
        class,
        begin_t,
        end_t,
        discretize_ratio: space.discretize_ratio(),
        cells,
        contributions,
    }
}

#[cfg(test)]
#[path = "detection_tests.rs"]
mod tests;
