//! Training state: the sequence list plus all pair bookkeeping.
//!
//! Incremental merging after Algorithm 2 of "Byte Pair Encoding is
//! Suboptimal for Language Model Pretraining"
//! (https://aclanthology.org/2023.findings-acl.38.pdf): a merge only touches
//! the slots where the chosen pair occurs and their direct neighbours.

use std::fmt::Write as _;

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    error::TrainError,
    frequency::FrequencyTable,
    interner::PairInterner,
    selector::FrequencySelector,
    sequence::SequenceList,
    types::{BoundaryTokens, PairId, REMOVED, SlotIdx, Token, TokenFreq, TokenPair},
};

/// Everything a training run mutates, owned in one place.
///
/// Construction lives in [`crate::build`]; the merge loop in
/// [`crate::trainer`].
#[derive(Debug)]
pub struct TrainingState {
    pub(crate) interner: PairInterner,
    pub(crate) table: FrequencyTable,
    pub(crate) selector: FrequencySelector,
    pub(crate) list: SequenceList,
    boundary: BoundaryTokens,
}

impl TrainingState {
    /// Rebuilds counts, positions and the selector from a linked list.
    ///
    /// `hints` maps pair ids to an expected occurrence count and only sizes
    /// the position lists; the counts themselves come from this full pass.
    pub(crate) fn reconcile(
        interner: PairInterner,
        list: SequenceList,
        boundary: BoundaryTokens,
        hints: &FxHashMap<PairId, usize>,
    ) -> Result<Self, TrainError> {
        let mut table = FrequencyTable::with_capacity(interner.id_bound());
        for id in 1..interner.id_bound() as PairId {
            let pair = interner.pair(id).ok_or(TrainError::UnknownPair(id))?;
            table.set_boundary(id, boundary.touches(pair));
        }
        for (&id, &hint) in hints {
            if !table.is_boundary(id) {
                table.positions_mut().init(id, hint)?;
            }
        }

        for slot in list.iter() {
            let id = list.pair_at(slot);
            if id == REMOVED || id as usize >= interner.id_bound() {
                return Err(TrainError::UnknownPair(id));
            }
            if !table.is_boundary(id) {
                table.increase(id);
                table.add_position(id, slot)?;
            }
        }

        let selector = FrequencySelector::from_table(&table, &interner);
        Ok(Self {
            interner,
            table,
            selector,
            list,
            boundary,
        })
    }

    pub fn interner(&self) -> &PairInterner {
        &self.interner
    }

    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    pub fn list(&self) -> &SequenceList {
        &self.list
    }

    pub fn boundary(&self) -> BoundaryTokens {
        self.boundary
    }

    /// Pair interned under `id`.
    pub fn pair_of(&self, id: PairId) -> Result<TokenPair, TrainError> {
        self.interner.pair(id).ok_or(TrainError::UnknownPair(id))
    }

    /// Interns `pair`, flagging it as boundary on first sight.
    pub fn intern(&mut self, pair: TokenPair) -> Result<PairId, TrainError> {
        let (id, new) = self.interner.intern(pair)?;
        if new {
            self.table.set_boundary(id, self.boundary.touches(pair));
        }
        Ok(id)
    }

    /// Splices `slot` out of the sequence and uncounts the pair it held.
    pub fn remove_at(&mut self, slot: SlotIdx) -> Result<PairId, TrainError> {
        if !self.list.is_alive(slot) {
            return Err(TrainError::BrokenChain { slot });
        }
        let id = self.list.unlink(slot);
        if !self.table.is_boundary(id) {
            self.table.decrease(id)?;
        }
        Ok(id)
    }

    /// Replaces every live occurrence of `target` with `new_token`.
    ///
    /// Occurrences are consumed left to right. A stored position whose slot
    /// no longer holds `target` (dead, or rewritten by an overlapping
    /// occurrence earlier in this pass) is skipped.
    ///
    /// Returns the number of occurrences collapsed.
    pub fn collapse(&mut self, target: PairId, new_token: Token) -> Result<usize, TrainError> {
        let positions = self.table.positions_mut().take_sorted(target);
        let mut touched: FxHashSet<PairId> = FxHashSet::default();
        touched.insert(target);
        let mut collapsed = 0;

        for slot in positions {
            if self.list.pair_at(slot) != target {
                trace!("skipping stale position {slot} of pair {target}");
                continue;
            }

            if let Some(left) = self.list.prev(slot) {
                let old = self.list.pair_at(left);
                let old_pair = self.pair_of(old)?;
                let new = self.intern(TokenPair(old_pair.0, new_token))?;
                self.rewrite(left, old, new)?;
                touched.extend([old, new]);
            }

            if let Some(right) = self.list.next(slot) {
                let old = self.list.pair_at(right);
                let old_pair = self.pair_of(old)?;
                let new = self.intern(TokenPair(new_token, old_pair.1))?;
                self.rewrite(right, old, new)?;
                touched.extend([old, new]);
            }

            self.remove_at(slot)?;
            collapsed += 1;
        }

        for id in touched {
            if self.table.is_boundary(id) {
                continue;
            }
            match self.table.get(id) {
                0 => self.table.remove(id),
                count => {
                    let pair = self.pair_of(id)?;
                    self.selector.push(count, id, pair);
                }
            }
        }

        Ok(collapsed)
    }

    /// Moves the occurrence at `slot` from pair `old` to pair `new`.
    ///
    /// Boundary pairs are relabelled but never counted.
    fn rewrite(&mut self, slot: SlotIdx, old: PairId, new: PairId) -> Result<(), TrainError> {
        if !self.table.is_boundary(old) {
            self.table.decrease(old)?;
        }
        if !self.table.is_boundary(new) {
            self.table.increase(new);
            self.table.add_position(new, slot)?;
        }
        self.list.set_pair(slot, new);
        Ok(())
    }

    /// Live non-boundary pair with the highest count.
    ///
    /// `Ok(None)` only when no live pair is left.
    pub fn most_frequent_pair(&mut self) -> Result<Option<(PairId, TokenFreq)>, TrainError> {
        match self.selector.peek_max(&self.table) {
            Some(best) => Ok(Some(best)),
            None if self.table.live_pairs() == 0 => Ok(None),
            None => Err(TrainError::EmptySelector {
                live: self.table.live_pairs(),
            }),
        }
    }

    /// Flattens the chain back into a token sequence.
    ///
    /// Each alive slot contributes the left token of its pair; the tail adds
    /// its right token as well.
    pub fn to_tokens(&self) -> Result<Vec<Token>, TrainError> {
        let Some(tail) = self.list.tail() else {
            return Ok(self.list.lone_token().into_iter().collect());
        };
        let mut tokens = Vec::with_capacity(self.list.len() + 1);
        for slot in self.list.iter() {
            tokens.push(self.pair_of(self.list.pair_at(slot))?.0);
        }
        tokens.push(self.pair_of(self.list.pair_at(tail))?.1);
        Ok(tokens)
    }

    /// Live sequence length in tokens.
    pub fn sequence_len(&self) -> usize {
        match self.list.len() {
            0 => usize::from(self.list.lone_token().is_some()),
            n => n + 1,
        }
    }

    /// Recounts every pair from the chain and compares with the table.
    ///
    /// Also checks the links and that neighbouring pairs agree on their
    /// shared token. Linear in the sequence length.
    pub fn check_consistency(&self) -> Result<(), TrainError> {
        self.list.verify()?;

        let mut counted: FxHashMap<PairId, usize> = FxHashMap::default();
        for slot in self.list.iter() {
            let id = self.list.pair_at(slot);
            if let Some(next) = self.list.next(slot)
                && self.pair_of(id)?.1 != self.pair_of(self.list.pair_at(next))?.0
            {
                return Err(TrainError::BrokenChain { slot });
            }
            if !self.table.is_boundary(id) {
                *counted.entry(id).or_insert(0) += 1;
            }
        }

        for id in 1..self.interner.id_bound() as PairId {
            if self.table.is_boundary(id) {
                continue;
            }
            let counted = counted.get(&id).copied().unwrap_or(0);
            let recorded = self.table.get(id);
            if counted != recorded {
                return Err(TrainError::CountMismatch {
                    pair: id,
                    counted,
                    recorded,
                });
            }
        }
        Ok(())
    }

    /// Current tokens and the `top` most frequent pairs, for debugging.
    pub fn describe(&self, top: usize) -> String {
        let mut out = String::from("Tokens:");
        if let Ok(tokens) = self.to_tokens() {
            for token in tokens {
                let _ = write!(out, " {token}");
            }
        }
        out.push_str("\nTop pairs:");

        let mut pairs: Vec<_> = self.table.iter_live().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for (id, freq) in pairs.into_iter().take(top) {
            if let Some(pair) = self.interner.pair(id) {
                let _ = write!(out, "\n  ({}, {}) : {freq}", pair.0, pair.1);
            }
        }
        out
    }
}
