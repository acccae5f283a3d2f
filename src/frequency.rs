//! Frequency table: authoritative live count per pair id.
//!
//! Counts, boundary flags and position lists are parallel arrays indexed by
//! pair id. They grow together when an id beyond the current capacity shows
//! up; existing entries are preserved across the resize.

use log::debug;

use crate::{
    error::TrainError,
    positions::PositionStore,
    types::{PairId, SlotIdx, TokenFreq},
};

/// Id space allocated before the first resize.
const DEFAULT_CAPACITY: usize = 1 << 10;

#[derive(Debug)]
pub struct FrequencyTable {
    counts: Vec<TokenFreq>,
    /// Sticky: set when the pair is first seen, never cleared.
    boundary: Vec<bool>,
    positions: PositionStore,
    /// Non-boundary pair ids with a positive count.
    live: usize,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl FrequencyTable {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            counts: vec![0; capacity],
            boundary: vec![false; capacity],
            positions: PositionStore::with_len(capacity),
            live: 0,
        }
    }

    /// Size of the allocated id space.
    pub fn capacity(&self) -> usize {
        self.counts.len()
    }

    /// Number of non-boundary pair ids with a positive count.
    pub fn live_pairs(&self) -> usize {
        self.live
    }

    /// Grows every parallel array so that `pair` is addressable.
    ///
    /// Capacity doubles until it covers `pair`.
    pub fn extend(&mut self, pair: PairId) {
        let needed = pair as usize + 1;
        if needed <= self.capacity() {
            return;
        }
        let mut capacity = self.capacity();
        while capacity < needed {
            capacity *= 2;
        }
        debug!(
            "extending frequency table from {} to {} pair ids",
            self.capacity(),
            capacity
        );
        self.counts.resize(capacity, 0);
        self.boundary.resize(capacity, false);
        self.positions.resize(capacity);
    }

    /// Flags `pair` as touching a boundary token.
    ///
    /// A `true` flag can never be reset.
    pub fn set_boundary(&mut self, pair: PairId, is_boundary: bool) {
        self.extend(pair);
        let idx = pair as usize;
        self.boundary[idx] |= is_boundary;
    }

    pub fn is_boundary(&self, pair: PairId) -> bool {
        self.boundary.get(pair as usize).copied().unwrap_or(false)
    }

    /// Current count of `pair`; zero for ids never counted.
    pub fn get(&self, pair: PairId) -> TokenFreq {
        self.counts.get(pair as usize).copied().unwrap_or(0)
    }

    /// Adds one occurrence, returning the new count.
    pub fn increase(&mut self, pair: PairId) -> TokenFreq {
        self.extend(pair);
        let idx = pair as usize;
        self.counts[idx] += 1;
        let count = self.counts[idx];
        if count == 1 && !self.boundary[idx] {
            self.live += 1;
        }
        count
    }

    /// Removes one occurrence, returning the new count.
    pub fn decrease(&mut self, pair: PairId) -> Result<TokenFreq, TrainError> {
        let idx = pair as usize;
        let count = self
            .counts
            .get_mut(idx)
            .ok_or(TrainError::UnknownPair(pair))?;
        if *count == 0 {
            return Err(TrainError::CountUnderflow(pair));
        }
        *count -= 1;
        let count = *count;
        if count == 0 && !self.boundary[idx] {
            self.live -= 1;
        }
        Ok(count)
    }

    /// Resets `pair` to zero and releases its positions.
    pub fn remove(&mut self, pair: PairId) {
        let idx = pair as usize;
        if let Some(count) = self.counts.get_mut(idx) {
            if *count > 0 && !self.boundary[idx] {
                self.live -= 1;
            }
            *count = 0;
        }
        self.positions.clear(pair);
    }

    /// Records that `pair` occurs at `slot`.
    pub fn add_position(&mut self, pair: PairId, slot: SlotIdx) -> Result<(), TrainError> {
        self.extend(pair);
        self.positions.append(pair, slot)
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut PositionStore {
        &mut self.positions
    }

    /// Iterates over `(pair_id, count)` for all live non-boundary pairs.
    pub fn iter_live(&self) -> impl Iterator<Item = (PairId, TokenFreq)> + '_ {
        self.counts
            .iter()
            .zip(&self.boundary)
            .enumerate()
            .filter(|&(_, (&count, &boundary))| count > 0 && !boundary)
            .map(|(id, (&count, _))| (id as PairId, count))
    }
}
