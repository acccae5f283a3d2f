//! Pair interner: bidirectional `TokenPair` <-> `PairId` mapping.
//!
//! Ids are dense, start at 1 (0 is [`REMOVED`](crate::types::REMOVED)) and
//! are never freed: merge history keeps referring to them after a pair's
//! count has dropped to zero.

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;

use crate::{
    error::TrainError,
    types::{PairId, TokenPair},
};

/// Append-only pair interner.
#[derive(Debug, Default)]
pub struct PairInterner {
    /// `pairs[id - 1]` is the pair interned under `id`.
    pairs: Vec<TokenPair>,
    ids: FxHashMap<TokenPair, PairId>,
}

impl PairInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `pair`, allocating the next one if it is unseen.
    ///
    /// The boolean is `true` when a new id was allocated.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::PairSpaceExhausted`] once every [`PairId`] is taken.
    pub fn intern(&mut self, pair: TokenPair) -> Result<(PairId, bool), TrainError> {
        if let Some(&id) = self.ids.get(&pair) {
            return Ok((id, false));
        }
        let id = next_id(self.pairs.len())?;
        self.pairs.push(pair);
        self.ids.insert(pair, id);
        Ok((id, true))
    }

    /// Id of an already interned pair.
    pub fn get(&self, pair: TokenPair) -> Option<PairId> {
        self.ids.get(&pair).copied()
    }

    /// Pair interned under `id`.
    pub fn pair(&self, id: PairId) -> Option<TokenPair> {
        let idx = (id as usize).checked_sub(1)?;
        self.pairs.get(idx).copied()
    }

    /// Number of pairs interned so far.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Exclusive upper bound of the id space handed out so far.
    pub fn id_bound(&self) -> usize {
        self.pairs.len() + 1
    }
}

/// Id handed to the pair interned after `len` others.
fn next_id(len: usize) -> Result<PairId, TrainError> {
    len.checked_add(1)
        .and_then(|id| PairId::try_from(id).ok())
        .ok_or(TrainError::PairSpaceExhausted)
}

/// Interner shared between construction workers.
///
/// All calls go through one mutex so that two workers racing on the same
/// unseen pair can never allocate two ids for it.
#[derive(Debug, Default)]
pub struct SharedInterner {
    inner: Mutex<PairInterner>,
}

impl SharedInterner {
    pub fn new(interner: PairInterner) -> Self {
        Self {
            inner: Mutex::new(interner),
        }
    }

    pub fn intern(&self, pair: TokenPair) -> Result<PairId, TrainError> {
        // `intern` leaves the maps consistent even if a holder panicked.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.intern(pair).map(|(id, _)| id)
    }

    pub fn into_inner(self) -> PairInterner {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut interner = PairInterner::new();
        let (a, new_a) = interner.intern(TokenPair(7, 8)).expect("id available");
        let (b, new_b) = interner.intern(TokenPair(8, 7)).expect("id available");
        assert_eq!((a, new_a), (1, true));
        assert_eq!((b, new_b), (2, true));
        assert_eq!(interner.id_bound(), 3);
    }

    #[test]
    fn test_reintern_returns_existing_id() {
        let mut interner = PairInterner::new();
        let (a, _) = interner.intern(TokenPair(7, 7)).expect("id available");
        let (again, new) = interner.intern(TokenPair(7, 7)).expect("id available");
        assert_eq!(a, again);
        assert!(!new);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_reverse_lookup() {
        let mut interner = PairInterner::new();
        let (id, _) = interner.intern(TokenPair(9, 10)).expect("id available");
        assert_eq!(interner.pair(id), Some(TokenPair(9, 10)));
        assert_eq!(interner.get(TokenPair(9, 10)), Some(id));
        assert_eq!(interner.pair(0), None);
        assert_eq!(interner.pair(id + 1), None);
    }

    #[test]
    fn test_shared_interner_is_race_free() {
        let shared = SharedInterner::default();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for t in 7..11 {
                        shared.intern(TokenPair(t, t)).expect("id available");
                    }
                });
            }
        });
        let interner = shared.into_inner();
        assert_eq!(interner.len(), 4);
        let mut ids: Vec<PairId> = (7..11)
            .map(|t| interner.get(TokenPair(t, t)).unwrap_or(0))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_id_space_is_bounded() {
        assert_eq!(next_id(0).expect("first id"), 1);
        let last = PairId::MAX as usize - 1;
        assert_eq!(next_id(last).expect("last id"), PairId::MAX);
        match next_id(PairId::MAX as usize) {
            Err(TrainError::PairSpaceExhausted) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        // never wraps onto the removed marker
        assert!(next_id(usize::MAX).is_err());
    }
}
