//! Position store: per pair id, the slots where that pair was seen.
//!
//! Lists are append-only. An entry stays behind after its occurrence is
//! consumed or rewritten, so consumers must re-check the slot's current
//! pair id before acting on it.

use crate::{
    error::TrainError,
    types::{PairId, SlotIdx},
};

/// Capacity of a list created implicitly by [`PositionStore::append`].
const DEFAULT_CAPACITY: usize = 4;

/// Growable position lists indexed by pair id.
///
/// Entries are stored one-based so that `0` can mean "no position".
#[derive(Debug, Default)]
pub struct PositionStore {
    lists: Vec<Option<Vec<usize>>>,
}

impl PositionStore {
    pub fn with_len(len: usize) -> Self {
        let mut lists = Vec::with_capacity(len);
        lists.resize_with(len, || None);
        Self { lists }
    }

    /// Number of pair ids the store can address.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Grows the id space to `len`, keeping every stored list.
    pub(crate) fn resize(&mut self, len: usize) {
        if len > self.lists.len() {
            self.lists.resize_with(len, || None);
        }
    }

    /// Allocates the list for `pair` with room for `hint` entries if it has none yet.
    pub fn init(&mut self, pair: PairId, hint: usize) -> Result<(), TrainError> {
        let slot = self
            .lists
            .get_mut(pair as usize)
            .ok_or(TrainError::UnknownPair(pair))?;
        if slot.is_none() {
            *slot = Some(Vec::with_capacity(hint.max(1)));
        }
        Ok(())
    }

    /// Appends `position` to `pair`'s list, creating the list on first use.
    pub fn append(&mut self, pair: PairId, position: SlotIdx) -> Result<(), TrainError> {
        let list = self
            .lists
            .get_mut(pair as usize)
            .ok_or(TrainError::UnknownPair(pair))?
            .get_or_insert_with(|| Vec::with_capacity(DEFAULT_CAPACITY));
        if list.len() == list.capacity() {
            // full: double
            list.reserve_exact(list.capacity().max(1));
        }
        list.push(position + 1);
        Ok(())
    }

    /// Number of entries stored for `pair` (stale ones included).
    pub fn size(&self, pair: PairId) -> usize {
        self.list(pair).map_or(0, Vec::len)
    }

    /// Zero-based position of the `index`-th entry of `pair`.
    pub fn get(&self, pair: PairId, index: usize) -> Result<SlotIdx, TrainError> {
        match self.get_plus_one(pair, index) {
            0 => Err(TrainError::PositionOutOfRange {
                pair,
                index,
                len: self.size(pair),
            }),
            p => Ok(p - 1),
        }
    }

    /// One-based position of the `index`-th entry of `pair`, or `0` if the
    /// list was released or holds fewer entries.
    pub fn get_plus_one(&self, pair: PairId, index: usize) -> usize {
        self.list(pair)
            .and_then(|list| list.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Releases the storage held for `pair`.
    pub fn clear(&mut self, pair: PairId) {
        if let Some(slot) = self.lists.get_mut(pair as usize) {
            *slot = None;
        }
    }

    /// Removes `pair`'s list and returns its positions ascending, deduplicated.
    ///
    /// Sorting restores left-to-right order: entries appended by later
    /// merges land after older ones regardless of where they sit.
    pub fn take_sorted(&mut self, pair: PairId) -> Vec<SlotIdx> {
        let Some(list) = self.lists.get_mut(pair as usize).and_then(Option::take) else {
            return Vec::new();
        };
        let mut positions: Vec<SlotIdx> = list.into_iter().map(|p| p - 1).collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    fn list(&self, pair: PairId) -> Option<&Vec<usize>> {
        self.lists.get(pair as usize).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_get() {
        let mut store = PositionStore::with_len(4);
        store.append(2, 0).expect("pair 2 is addressable");
        store.append(2, 9).expect("pair 2 is addressable");
        assert_eq!(store.size(2), 2);
        assert_eq!(store.get(2, 0).expect("entry 0 exists"), 0);
        assert_eq!(store.get(2, 1).expect("entry 1 exists"), 9);
        assert_eq!(store.get_plus_one(2, 1), 10);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut store = PositionStore::with_len(4);
        store.append(1, 3).expect("pair 1 is addressable");
        assert_eq!(store.get_plus_one(1, 5), 0);
        match store.get(1, 5) {
            Err(TrainError::PositionOutOfRange { pair, index, len }) => {
                assert_eq!((pair, index, len), (1, 5, 1));
            }
            other => panic!("expected PositionOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_pair_is_rejected() {
        let mut store = PositionStore::with_len(2);
        assert!(matches!(
            store.append(7, 0),
            Err(TrainError::UnknownPair(7))
        ));
        assert!(matches!(store.init(7, 8), Err(TrainError::UnknownPair(7))));
    }

    #[test]
    fn test_growth_keeps_entries() {
        let mut store = PositionStore::with_len(2);
        store.init(1, 1).expect("pair 1 is addressable");
        for p in 0..100 {
            store.append(1, p).expect("pair 1 is addressable");
        }
        assert_eq!(store.size(1), 100);
        assert_eq!(store.get(1, 57).expect("entry 57 exists"), 57);
    }

    #[test]
    fn test_clear_releases_list() {
        let mut store = PositionStore::with_len(2);
        store.append(1, 4).expect("pair 1 is addressable");
        store.clear(1);
        assert_eq!(store.size(1), 0);
        assert_eq!(store.get_plus_one(1, 0), 0);
        // a cleared list is recreated on the next append
        store.append(1, 6).expect("pair 1 is addressable");
        assert_eq!(store.get(1, 0).expect("entry 0 exists"), 6);
    }

    #[test]
    fn test_take_sorted_dedups() {
        let mut store = PositionStore::with_len(2);
        for p in [8, 2, 8, 5, 2] {
            store.append(1, p).expect("pair 1 is addressable");
        }
        assert_eq!(store.take_sorted(1), vec![2, 5, 8]);
        assert_eq!(store.size(1), 0);
    }

    #[test]
    fn test_resize_preserves_lists() {
        let mut store = PositionStore::with_len(2);
        store.append(1, 3).expect("pair 1 is addressable");
        store.resize(16);
        assert_eq!(store.len(), 16);
        assert_eq!(store.get(1, 0).expect("entry 0 exists"), 3);
        store
            .append(15, 1)
            .expect("pair 15 is addressable after resize");
    }
}
