//! Type aliases and shared types for BPE training over symbol sequences.
//!
//! These type aliases provide semantic clarity throughout the codebase.

/// Represents a token identifier in the vocabulary.
///
/// Ids below the alphabet size are base symbols (the lowest of them are
/// boundary/help tokens); every accepted merge assigns the next id upward.
pub type Token = u16;

/// Dense handle of an interned pair, assigned on first sighting.
///
/// Id `0` is reserved for [`REMOVED`] and never handed out by the interner.
pub type PairId = u32;

/// Index of a slot in the flat sequence arrays.
///
/// Slots are never reused, so an index stays valid for the whole run.
pub type SlotIdx = usize;

/// Live occurrence count of a pair.
pub type TokenFreq = usize;

/// Pair id stored in a slot that has been spliced out of the sequence.
pub const REMOVED: PairId = 0;

/// Largest token id representable by [`Token`].
pub const MAX_TOKEN_ID: usize = Token::MAX as usize;

/// A pair of adjacent tokens `(left, right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenPair(pub Token, pub Token);

impl TokenPair {
    /// Left token of the pair.
    #[inline]
    pub fn left(self) -> Token {
        self.0
    }

    /// Right token of the pair.
    #[inline]
    pub fn right(self) -> Token {
        self.1
    }
}

/// One accepted merge, in the order it was learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRecord {
    /// Interned id of the merged pair.
    pub pair_id: PairId,
    /// The merged pair itself.
    pub pair: TokenPair,
    /// Token id assigned to the merged pair.
    pub token: Token,
    /// Live count of the pair when it was selected.
    pub freq: TokenFreq,
}

/// Predicate marking the reserved low range of boundary tokens.
///
/// Tokens `0..n_help` separate sequences; a pair touching one of them
/// is never counted or merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTokens {
    n_help: Token,
}

impl BoundaryTokens {
    pub fn new(n_help: Token) -> Self {
        Self { n_help }
    }

    /// Number of reserved help tokens.
    pub fn count(self) -> Token {
        self.n_help
    }

    #[inline]
    pub fn is_boundary(self, token: Token) -> bool {
        token < self.n_help
    }

    /// Whether either side of `pair` is a boundary token.
    #[inline]
    pub fn touches(self, pair: TokenPair) -> bool {
        self.is_boundary(pair.0) || self.is_boundary(pair.1)
    }
}
