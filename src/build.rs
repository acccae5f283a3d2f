//! Construction of a [`TrainingState`] from a raw token sequence.
//!
//! The parallel path is fork-join: workers link disjoint slot ranges and
//! intern pairs through one shared interner, then the range seams are
//! stitched and a single sequential pass rebuilds all counts.

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    error::TrainError,
    interner::{PairInterner, SharedInterner},
    sequence::{NIL, SequenceList},
    state::TrainingState,
    types::{BoundaryTokens, PairId, REMOVED, SlotIdx, Token, TokenPair},
};

/// Below this many slots per worker the sequential path is used.
const MIN_SLOTS_PER_WORKER: usize = 1 << 12;

impl TrainingState {
    /// Builds the training state for `tokens` using up to `n_threads` workers.
    pub fn build(
        tokens: &[Token],
        boundary: BoundaryTokens,
        n_threads: usize,
    ) -> Result<Self, TrainError> {
        let n_slots = tokens.len().saturating_sub(1);
        let workers = n_threads.min(n_slots / MIN_SLOTS_PER_WORKER).max(1);
        info!(
            "building sequence list: {} tokens, {} slots, {} worker(s)",
            tokens.len(),
            n_slots,
            workers
        );
        if workers == 1 {
            build_sequential(tokens, boundary)
        } else {
            build_parallel(tokens, boundary, workers)
        }
    }
}

/// Single pass: link every slot and intern its pair in order.
pub(crate) fn build_sequential(
    tokens: &[Token],
    boundary: BoundaryTokens,
) -> Result<TrainingState, TrainError> {
    let n_slots = tokens.len().saturating_sub(1);
    let mut interner = PairInterner::new();
    let mut hints: FxHashMap<PairId, usize> = FxHashMap::default();
    let mut pair_ids = Vec::with_capacity(n_slots);

    for window in tokens.windows(2) {
        let pair = TokenPair(window[0], window[1]);
        let (id, _) = interner.intern(pair)?;
        pair_ids.push(id);
        if !boundary.touches(pair) {
            *hints.entry(id).or_insert(0) += 1;
        }
    }

    let (prev, next) = linear_links(n_slots);
    let list = SequenceList::from_raw(pair_ids, prev, next, lone(tokens));
    TrainingState::reconcile(interner, list, boundary, &hints)
}

/// Fork-join construction over `workers` contiguous slot ranges.
pub(crate) fn build_parallel(
    tokens: &[Token],
    boundary: BoundaryTokens,
    workers: usize,
) -> Result<TrainingState, TrainError> {
    let n_slots = tokens.len().saturating_sub(1);
    let chunk = n_slots.div_ceil(workers).max(1);

    let mut pair_ids = vec![REMOVED; n_slots];
    let mut prev = vec![NIL; n_slots];
    let mut next = vec![NIL; n_slots];
    let shared = SharedInterner::default();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| TrainError::ThreadPool(e.to_string()))?;

    let local_counts = pool.install(|| {
        pair_ids
            .par_chunks_mut(chunk)
            .zip(prev.par_chunks_mut(chunk))
            .zip(next.par_chunks_mut(chunk))
            .enumerate()
            .map(|(k, ((ids, prev), next))| {
                let start = k * chunk;
                // Tokens owned by this range; the right token of the last
                // slot belongs to the next range and is stitched after join.
                let local = &tokens[start..start + ids.len()];
                link_range(local, start, n_slots, ids, prev, next, &shared, boundary)
            })
            .collect::<Result<Vec<_>, TrainError>>()
    })?;

    // Stitch the last slot of every range against the real neighbour.
    let mut interner = shared.into_inner();
    let n_ranges = n_slots.div_ceil(chunk);
    for k in 1..=n_ranges {
        let slot = (k * chunk).min(n_slots) - 1;
        let (id, _) = interner.intern(TokenPair(tokens[slot], tokens[slot + 1]))?;
        pair_ids[slot] = id;
    }
    debug!(
        "joined {} ranges, {} pairs interned",
        local_counts.len(),
        interner.len()
    );

    // Per-range counts only size the position lists.
    let mut hints: FxHashMap<PairId, usize> = FxHashMap::default();
    for counts in local_counts {
        for (id, count) in counts {
            *hints.entry(id).or_insert(0) += count;
        }
    }

    let list = SequenceList::from_raw(pair_ids, prev, next, lone(tokens));
    TrainingState::reconcile(interner, list, boundary, &hints)
}

/// Links and interns one range of slots starting at global index `start`.
///
/// The last slot of the range is left as [`REMOVED`] for stitching.
#[allow(clippy::too_many_arguments)]
fn link_range(
    local: &[Token],
    start: SlotIdx,
    n_slots: usize,
    ids: &mut [PairId],
    prev: &mut [SlotIdx],
    next: &mut [SlotIdx],
    interner: &SharedInterner,
    boundary: BoundaryTokens,
) -> Result<FxHashMap<PairId, usize>, TrainError> {
    let mut counts: FxHashMap<PairId, usize> = FxHashMap::default();
    for j in 0..ids.len() {
        let slot = start + j;
        prev[j] = if slot == 0 { NIL } else { slot - 1 };
        next[j] = if slot + 1 == n_slots { NIL } else { slot + 1 };

        if j + 1 < local.len() {
            let pair = TokenPair(local[j], local[j + 1]);
            let id = interner.intern(pair)?;
            ids[j] = id;
            if !boundary.touches(pair) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

fn linear_links(n_slots: usize) -> (Vec<SlotIdx>, Vec<SlotIdx>) {
    let prev = (0..n_slots)
        .map(|i| if i == 0 { NIL } else { i - 1 })
        .collect();
    let next = (0..n_slots)
        .map(|i| if i + 1 == n_slots { NIL } else { i + 1 })
        .collect();
    (prev, next)
}

fn lone(tokens: &[Token]) -> Option<Token> {
    match tokens {
        [only] => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenFreq;
    use proptest::prelude::*;
    use std::ops::Range;

    /// Genome-like input: mostly bases, with separators and `N` mixed in.
    fn genome(max_len: usize) -> impl Strategy<Value = Vec<Token>> {
        let bases: Range<Token> = 7..11;
        let symbol = prop_oneof![10 => bases, 1 => Just(5), 1 => Just(6)];
        prop::collection::vec(symbol, 0..max_len)
    }

    /// Live pair counts keyed by pair value, whatever ids were assigned.
    fn pair_counts(state: &TrainingState) -> Vec<(TokenPair, TokenFreq)> {
        let mut counts: Vec<(TokenPair, TokenFreq)> = state
            .table()
            .iter_live()
            .filter_map(|(id, c)| state.interner().pair(id).map(|p| (p, c)))
            .collect();
        counts.sort_unstable();
        counts
    }

    /// Merges until no pair repeats, checking counts after every collapse.
    fn merge_all(
        mut state: TrainingState,
    ) -> Result<(Vec<(TokenPair, TokenFreq)>, Vec<Token>), TrainError> {
        let mut merged = Vec::new();
        let mut next: Token = 11;
        while let Some((id, freq)) = state.most_frequent_pair()? {
            if freq < 2 {
                break;
            }
            let pair = state.pair_of(id)?;
            state.collapse(id, next)?;
            state.check_consistency()?;
            merged.push((pair, freq));
            next += 1;
        }
        Ok((merged, state.to_tokens()?))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_parallel_build_matches_sequential(
            tokens in genome(300),
            workers in 1_usize..8
        ) {
            let boundary = BoundaryTokens::new(7);
            let seq = build_sequential(&tokens, boundary)
                .expect("sequential build succeeds");
            let par = build_parallel(&tokens, boundary, workers)
                .expect("parallel build succeeds");

            seq.check_consistency().expect("sequential counts are exact");
            par.check_consistency().expect("parallel counts are exact");
            prop_assert_eq!(&seq.to_tokens().expect("chain is intact"), &tokens);
            prop_assert_eq!(&par.to_tokens().expect("chain is intact"), &tokens);
            prop_assert_eq!(pair_counts(&seq), pair_counts(&par));

            let merged_seq = merge_all(seq).expect("sequential state merges");
            let merged_par = merge_all(par).expect("parallel state merges");
            prop_assert_eq!(merged_seq, merged_par);
        }
    }

    #[test]
    fn test_parallel_more_workers_than_slots() {
        let tokens = [7, 8, 9];
        let state = build_parallel(&tokens, BoundaryTokens::new(6), 8)
            .expect("parallel build succeeds");
        assert_eq!(state.to_tokens().expect("chain is intact"), tokens.to_vec());
        state.check_consistency().expect("counts are exact");
    }

    #[test]
    fn test_build_picks_sequential_for_small_input() {
        let tokens: Vec<Token> = [7, 8, 9, 10, 5].repeat(20);
        let state = TrainingState::build(&tokens, BoundaryTokens::new(7), 16)
            .expect("build succeeds");
        assert_eq!(state.list().slots(), 99);
        state.check_consistency().expect("counts are exact");
    }

    #[test]
    fn test_boundary_pairs_flagged_but_uncounted() {
        let tokens = [7, 5, 7];
        let state = build_sequential(&tokens, BoundaryTokens::new(6)).expect("build succeeds");
        assert_eq!(state.table().live_pairs(), 0);
        for id in 1..state.interner().id_bound() as PairId {
            assert!(state.table().is_boundary(id));
        }
    }

    #[test]
    fn test_empty_and_single() {
        let state = build_sequential(&[], BoundaryTokens::new(6)).expect("build succeeds");
        assert!(state.list().is_empty());
        let state = build_parallel(&[9], BoundaryTokens::new(6), 4).expect("build succeeds");
        assert_eq!(state.to_tokens().expect("lone token survives"), vec![9]);
    }
}
