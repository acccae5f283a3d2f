//! Lazy max-heap over `(count, pair)`.
//!
//! Entries are never updated in place. Every count change is followed by a
//! fresh push, and entries whose stored count no longer matches the
//! frequency table are dropped when they reach the top.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{
    frequency::FrequencyTable,
    interner::PairInterner,
    types::{PairId, TokenFreq, TokenPair},
};

/// Item in max heap.
#[derive(Debug, PartialEq, Eq)]
struct HeapItem {
    freq: TokenFreq,
    pair: TokenPair,
    id: PairId,
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // Ord implementation ensures all heap items are comparable.
        Some(self.cmp(other))
    }
}

/// Highest freq pair at top.
///
/// Ties are broken on the token values, not the pair id, so the choice
/// does not depend on the order in which construction workers interned.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.freq
            .cmp(&other.freq)
            .then_with(|| self.pair.0.cmp(&other.pair.0))
            .then_with(|| self.pair.1.cmp(&other.pair.1))
    }
}

#[derive(Debug, Default)]
pub struct FrequencySelector {
    heap: BinaryHeap<HeapItem>,
}

impl FrequencySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the heap with every live pair of `table`.
    pub fn from_table(table: &FrequencyTable, interner: &PairInterner) -> Self {
        let heap = table
            .iter_live()
            .filter_map(|(id, freq)| interner.pair(id).map(|pair| HeapItem { freq, pair, id }))
            .collect();
        Self { heap }
    }

    pub fn push(&mut self, freq: TokenFreq, id: PairId, pair: TokenPair) {
        self.heap.push(HeapItem { freq, pair, id });
    }

    /// Number of entries held, stale ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the live pair with the highest count.
    ///
    /// Stale entries on top are discarded; the valid entry is left in place.
    /// `None` means no entry matches the table any more.
    pub fn peek_max(&mut self, table: &FrequencyTable) -> Option<(PairId, TokenFreq)> {
        while let Some(top) = self.heap.peek() {
            if top.freq > 0 && table.get(top.id) == top.freq && !table.is_boundary(top.id) {
                return Some((top.id, top.freq));
            }
            // Stale entry, discard it and keep on looking.
            self.heap.pop();
        }
        None
    }
}
