// VotingSpace - hash-sparse 4D Hough accumulator
//
// Votes are discretized by rounding `coordinate * discretize_ratio` and
// accumulated into cells keyed by the row-major index of
// `(t, y, x, scale_index)`. The time axis slides forward: cells older than
// `min_t` are never written, and `evict_expired` drops the oldest
// `delete_step` frames and advances the window.
//
// Module organization:
// - caster: Turns per-tree leaf statistics into weighted votes
// - mod.rs: Accumulator (VotingSpace) and its query types

mod caster;

pub use caster::{Vote, VoteCaster};

use std::collections::HashMap;

use serde::Serialize;

use crate::config::VotingConfig;
use crate::error::ConfigError;
use crate::index::CellLayout;
use crate::types::{ContributionPoint, SpatioTemporalAnchor};

/// One occupied cell returned by [`VotingSpace::query_range`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoteCell {
    /// Flat cell index
    pub index: usize,
    /// `[t, y, x, scale]` in grid units; the last component is the scale value
    pub point: [f32; 4],
    pub weight: f32,
}

/// Sparse accumulator over discretized `(t, y, x, scale)`
#[derive(Debug, Clone)]
pub struct VotingSpace {
    layout: CellLayout,
    scales: Vec<f64>,
    discretize_ratio: f64,
    delete_step: usize,
    min_t: usize,
    max_t: usize,
    cells: HashMap<usize, f32>,
    contributions: Option<HashMap<usize, Vec<ContributionPoint>>>,
}

impl VotingSpace {
    /// Create an empty accumulator covering `[0, buffer_length)`
    ///
    /// # Arguments
    /// * `width` - Grid width in cells
    /// * `height` - Grid height in cells
    /// * `scales` - Scale value per scale index
    /// * `config` - Ratio, eviction step, initial window and tracing flag
    ///
    /// # Returns
    /// * `Err(ConfigError)` - zero grid size, no scales, or invalid voting parameters
    pub fn new(
        width: usize,
        height: usize,
        scales: Vec<f64>,
        config: &VotingConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroSize {
                parameter: "voting grid".to_string(),
            });
        }
        if scales.is_empty() {
            return Err(ConfigError::EmptyScales);
        }

        log::debug!(
            "[VotingSpace] {}x{} cells, {} scales, window [0, {})",
            width,
            height,
            scales.len(),
            config.buffer_length
        );

        Ok(Self {
            layout: CellLayout::new([height, width, scales.len()]),
            scales,
            discretize_ratio: config.discretize_ratio,
            delete_step: config.delete_step,
            min_t: 0,
            max_t: config.buffer_length,
            cells: HashMap::new(),
            contributions: config.trace_contributions.then(HashMap::new),
        })
    }

    /// Accumulate `weight` at `point = [t, y, x]` (frame coordinates)
    ///
    /// # Returns
    /// `true` when the vote landed in a cell, `false` when it was dropped
    /// for falling before `min_t` or outside the grid
    pub fn add_vote(&mut self, point: [f32; 3], scale_index: usize, weight: f32) -> bool {
        match self.cell_index(point, scale_index) {
            Some(index) => {
                *self.cells.entry(index).or_insert(0.0) += weight;
                true
            }
            None => false,
        }
    }

    /// Like [`VotingSpace::add_vote`], also recording the descriptor anchor
    /// that cast the vote when contribution tracing is enabled
    pub fn add_traced_vote(
        &mut self,
        point: [f32; 3],
        scale_index: usize,
        weight: f32,
        anchor: SpatioTemporalAnchor,
    ) -> bool {
        let Some(index) = self.cell_index(point, scale_index) else {
            return false;
        };
        *self.cells.entry(index).or_insert(0.0) += weight;
        if let Some(contributions) = self.contributions.as_mut() {
            contributions
                .entry(index)
                .or_default()
                .push(ContributionPoint { anchor, weight });
        }
        true
    }

    /// Drop every cell with `t` in `[min_t, min_t + delete_step)` and slide the window
    pub fn evict_expired(&mut self) {
        let band_end = self.min_t.saturating_add(self.delete_step);
        let begin = self.layout.outer_start(self.clamp_t(self.min_t));
        let end = self.layout.outer_start(self.clamp_t(band_end));
        let before = self.cells.len();
        self.cells.retain(|index, _| !(begin..end).contains(index));
        if let Some(contributions) = self.contributions.as_mut() {
            contributions.retain(|index, _| !(begin..end).contains(index));
        }
        log::debug!(
            "[VotingSpace] Evicted {} cells from [{}, {})",
            before - self.cells.len(),
            self.min_t,
            band_end
        );
        self.min_t = band_end;
        self.max_t = self.max_t.saturating_add(self.delete_step);
    }

    /// Slide the window past every empty band before the oldest occupied cell
    ///
    /// Equivalent to calling [`VotingSpace::evict_expired`] once per skipped
    /// band; `min_t` stays aligned to `delete_step` boundaries.
    pub fn skip_empty_bands(&mut self) {
        let Some(earliest) = self.earliest_t() else {
            return;
        };
        let skipped = earliest.saturating_sub(self.min_t) / self.delete_step;
        if skipped == 0 {
            return;
        }
        let shift = skipped.saturating_mul(self.delete_step);
        log::debug!(
            "[VotingSpace] Skipping {} empty bands from {}",
            skipped,
            self.min_t
        );
        self.min_t = self.min_t.saturating_add(shift);
        self.max_t = self.max_t.saturating_add(shift);
    }

    /// Time of the oldest occupied cell
    pub fn earliest_t(&self) -> Option<usize> {
        self.cells.keys().map(|&index| self.decode(index)[0]).min()
    }

    /// Every occupied cell with `t` in `[begin_t, end_t)`, ordered by cell index
    ///
    /// Bounds past the last addressable time are clamped.
    pub fn query_range(&self, begin_t: usize, end_t: usize) -> Vec<VoteCell> {
        let (begin_t, end_t) = (self.clamp_t(begin_t), self.clamp_t(end_t));
        if begin_t >= end_t {
            return Vec::new();
        }
        let range = self.layout.outer_start(begin_t)..self.layout.outer_start(end_t);
        let mut cells: Vec<VoteCell> = self
            .cells
            .iter()
            .filter(|(index, _)| range.contains(*index))
            .map(|(&index, &weight)| {
                let [t, y, x, s] = self.decode(index);
                VoteCell {
                    index,
                    point: [t as f32, y as f32, x as f32, self.scales[s] as f32],
                    weight,
                }
            })
            .collect();
        cells.sort_unstable_by_key(|cell| cell.index);
        cells
    }

    /// Discretize a frame-coordinate point
    ///
    /// # Returns
    /// `[t, y, x]` in grid units, or `None` when a coordinate rounds below zero
    pub fn discretize(&self, point: [f32; 3]) -> Option<[usize; 3]> {
        let mut cell = [0usize; 3];
        for (out, &coordinate) in cell.iter_mut().zip(point.iter()) {
            let scaled = (coordinate as f64 * self.discretize_ratio).round();
            if !scaled.is_finite() || scaled < 0.0 {
                return None;
            }
            *out = scaled as usize;
        }
        Some(cell)
    }

    /// Map grid coordinates back to frame coordinates; the scale component is kept
    pub fn to_original(&self, point: [f32; 4]) -> [f32; 4] {
        let ratio = self.discretize_ratio as f32;
        [point[0] / ratio, point[1] / ratio, point[2] / ratio, point[3]]
    }

    /// Flat index of an in-range cell; see [`VotingSpace::max_t_index`] for the time bound
    pub fn encode(&self, t: usize, y: usize, x: usize, scale_index: usize) -> usize {
        self.layout.encode(t, [y, x, scale_index])
    }

    /// Inverse of [`VotingSpace::encode`]: `[t, y, x, scale_index]`
    pub fn decode(&self, index: usize) -> [usize; 4] {
        let (t, [y, x, s]) = self.layout.decode(index);
        [t, y, x, s]
    }

    /// Accumulated weight of one cell (zero when unoccupied)
    pub fn weight(&self, t: usize, y: usize, x: usize, scale_index: usize) -> f32 {
        self.layout
            .checked_encode(t, [y, x, scale_index])
            .and_then(|index| self.cells.get(&index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Votes recorded for a cell; empty unless tracing is enabled
    pub fn contributions(&self, index: usize) -> &[ContributionPoint] {
        self.contributions
            .as_ref()
            .and_then(|c| c.get(&index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Largest time coordinate a cell can hold
    pub fn max_t_index(&self) -> usize {
        self.layout.max_outer()
    }

    pub fn min_t(&self) -> usize {
        self.min_t
    }

    pub fn max_t(&self) -> usize {
        self.max_t
    }

    pub fn delete_step(&self) -> usize {
        self.delete_step
    }

    pub fn discretize_ratio(&self) -> f64 {
        self.discretize_ratio
    }

    pub fn width(&self) -> usize {
        self.layout.extents()[1]
    }

    pub fn height(&self) -> usize {
        self.layout.extents()[0]
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bounds-checked cell index for a vote; `t >= max_t` is accepted
    /// up to the last addressable time
    fn cell_index(&self, point: [f32; 3], scale_index: usize) -> Option<usize> {
        let [t, y, x] = self.discretize(point)?;
        if t < self.min_t || t > self.max_t_index() || !self.layout.contains([y, x, scale_index]) {
            return None;
        }
        self.layout.checked_encode(t, [y, x, scale_index])
    }

    /// Time bound usable as an exclusive range end without overflow
    fn clamp_t(&self, t: usize) -> usize {
        t.min(self.max_t_index() + 1)
    }
}

#[cfg(test)]
#[path = "voting_tests.rs"]
mod tests;
