//! Doubly linked list over flat index arrays.
//!
//! Slot `i` anchors the pair formed by the token originally at position `i`
//! and the token that follows it. A slot is spliced out by re-pointing its
//! neighbours; its array entries stay allocated and are never reused.

use crate::{
    error::TrainError,
    types::{PairId, REMOVED, SlotIdx, Token},
};

/// Link value meaning "no neighbour".
pub(crate) const NIL: SlotIdx = SlotIdx::MAX;

#[derive(Debug, Default)]
pub struct SequenceList {
    /// Pair id anchored at each slot; [`REMOVED`] once spliced out.
    pair_ids: Vec<PairId>,
    prev: Vec<SlotIdx>,
    next: Vec<SlotIdx>,
    head: SlotIdx,
    tail: SlotIdx,
    alive: usize,
    /// Token of a one-token input, which has no pair to anchor.
    lone: Option<Token>,
}

impl SequenceList {
    /// Assembles a list from fully linked arrays.
    ///
    /// `prev`/`next` must describe one chain over all slots in index order.
    pub(crate) fn from_raw(
        pair_ids: Vec<PairId>,
        prev: Vec<SlotIdx>,
        next: Vec<SlotIdx>,
        lone: Option<Token>,
    ) -> Self {
        let n = pair_ids.len();
        let (head, tail) = if n == 0 { (NIL, NIL) } else { (0, n - 1) };
        Self {
            pair_ids,
            prev,
            next,
            head,
            tail,
            alive: n,
            lone,
        }
    }

    /// Number of alive slots.
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Number of slots ever allocated.
    pub fn slots(&self) -> usize {
        self.pair_ids.len()
    }

    pub fn head(&self) -> Option<SlotIdx> {
        link(self.head)
    }

    pub fn tail(&self) -> Option<SlotIdx> {
        link(self.tail)
    }

    pub(crate) fn lone_token(&self) -> Option<Token> {
        self.lone
    }

    /// Pair id currently anchored at `slot`, [`REMOVED`] if dead.
    #[inline]
    pub fn pair_at(&self, slot: SlotIdx) -> PairId {
        self.pair_ids.get(slot).copied().unwrap_or(REMOVED)
    }

    #[inline]
    pub fn is_alive(&self, slot: SlotIdx) -> bool {
        self.pair_at(slot) != REMOVED
    }

    #[inline]
    pub(crate) fn set_pair(&mut self, slot: SlotIdx, pair: PairId) {
        self.pair_ids[slot] = pair;
    }

    #[inline]
    pub fn prev(&self, slot: SlotIdx) -> Option<SlotIdx> {
        self.prev.get(slot).copied().and_then(link)
    }

    #[inline]
    pub fn next(&self, slot: SlotIdx) -> Option<SlotIdx> {
        self.next.get(slot).copied().and_then(link)
    }

    /// Splices `slot` out of the chain and marks it dead.
    ///
    /// Returns the pair id it held.
    pub(crate) fn unlink(&mut self, slot: SlotIdx) -> PairId {
        let prev = self.prev[slot];
        let next = self.next[slot];

        if prev == NIL {
            self.head = next;
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.prev[next] = prev;
        }

        self.prev[slot] = NIL;
        self.next[slot] = NIL;
        self.alive -= 1;
        std::mem::replace(&mut self.pair_ids[slot], REMOVED)
    }

    /// Alive slots from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.head,
        }
    }

    /// Checks that the chain visits every alive slot exactly once with
    /// mirrored links.
    pub fn verify(&self) -> Result<(), TrainError> {
        let mut visited = 0;
        let mut prev = NIL;
        let mut cur = self.head;
        while cur != NIL {
            if !self.is_alive(cur) || self.prev[cur] != prev || visited >= self.alive {
                return Err(TrainError::BrokenChain { slot: cur });
            }
            visited += 1;
            prev = cur;
            cur = self.next[cur];
        }
        if visited != self.alive || prev != self.tail {
            return Err(TrainError::BrokenChain { slot: prev });
        }
        Ok(())
    }
}

#[inline]
fn link(idx: SlotIdx) -> Option<SlotIdx> {
    (idx != NIL).then_some(idx)
}

/// Iterator over alive slot indices.
pub struct Iter<'a> {
    list: &'a SequenceList,
    cur: SlotIdx,
}

impl Iterator for Iter<'_> {
    type Item = SlotIdx;

    fn next(&mut self) -> Option<SlotIdx> {
        let slot = link(self.cur)?;
        self.cur = self.list.next[slot];
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(pair_ids: Vec<PairId>) -> SequenceList {
        let n = pair_ids.len();
        let prev = (0..n).map(|i| if i == 0 { NIL } else { i - 1 }).collect();
        let next = (0..n).map(|i| if i + 1 == n { NIL } else { i + 1 }).collect();
        SequenceList::from_raw(pair_ids, prev, next, None)
    }

    #[test]
    fn test_iter_visits_all_slots() {
        let list = chain(vec![1, 2, 3]);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(list.head(), Some(0));
        assert_eq!(list.tail(), Some(2));
        list.verify().expect("fresh chain is consistent");
    }

    #[test]
    fn test_unlink_middle() {
        let mut list = chain(vec![1, 2, 3]);
        assert_eq!(list.unlink(1), 2);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(list.next(0), Some(2));
        assert_eq!(list.prev(2), Some(0));
        assert!(!list.is_alive(1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.slots(), 3);
        list.verify().expect("chain stays consistent");
    }

    #[test]
    fn test_unlink_ends() {
        let mut list = chain(vec![1, 2, 3]);
        list.unlink(0);
        list.unlink(2);
        assert_eq!(list.head(), Some(1));
        assert_eq!(list.tail(), Some(1));
        assert_eq!(list.prev(1), None);
        assert_eq!(list.next(1), None);
        list.unlink(1);
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        list.verify().expect("empty chain is consistent");
    }

    #[test]
    fn test_verify_detects_broken_link() {
        let mut list = chain(vec![1, 2, 3]);
        list.prev[2] = NIL;
        assert!(matches!(list.verify(), Err(TrainError::BrokenChain { .. })));
    }

    #[test]
    fn test_empty_list() {
        let list = chain(Vec::new());
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
        list.verify().expect("empty chain is consistent");
    }
}
