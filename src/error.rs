//! Error types for training, configuration and the I/O adapters.

use std::{fmt, io};

use indicatif::style::TemplateError;

use crate::types::{PairId, SlotIdx, Token};

/// Fatal errors raised by the merge engine.
///
/// Every variant names a broken invariant: BPE counts must be exact, so the
/// run is aborted rather than continued with a corrupted vocabulary.
#[derive(Debug)]
pub enum TrainError {
    /// The selector ran dry while `live` pairs still claim a positive count.
    EmptySelector { live: usize },
    /// Pair id was never interned or lies beyond the frequency table.
    UnknownPair(PairId),
    /// A count was decremented below zero.
    CountUnderflow(PairId),
    /// Position lookup past the end of a pair's position list.
    PositionOutOfRange {
        pair: PairId,
        index: usize,
        len: usize,
    },
    /// Link structure of the sequence list is inconsistent at `slot`.
    BrokenChain { slot: SlotIdx },
    /// Recorded count disagrees with the number of live slots holding the pair.
    CountMismatch {
        pair: PairId,
        counted: usize,
        recorded: usize,
    },
    /// Every pair id is taken; no further pair can be interned.
    PairSpaceExhausted,
    /// Selected pair had a positive count but no live occurrence.
    NothingCollapsed(PairId),
    /// The construction thread pool could not be created.
    ThreadPool(String),
    /// Progress bar template string was invalid.
    ProgressBarSetup(TemplateError),
    /// Trainer was created with an invalid configuration.
    Config(ConfigError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySelector { live } => {
                write!(f, "frequency selector is empty but {live} pairs are live")
            }
            Self::UnknownPair(id) => write!(f, "unknown pair id: {id}"),
            Self::CountUnderflow(id) => write!(f, "count underflow for pair id {id}"),
            Self::PositionOutOfRange { pair, index, len } => write!(
                f,
                "position {index} out of range for pair id {pair} ({len} stored)"
            ),
            Self::BrokenChain { slot } => write!(f, "sequence chain broken at slot {slot}"),
            Self::CountMismatch {
                pair,
                counted,
                recorded,
            } => write!(
                f,
                "pair id {pair}: {counted} live slots but recorded count is {recorded}"
            ),
            Self::PairSpaceExhausted => write!(f, "pair id space exhausted"),
            Self::NothingCollapsed(id) => {
                write!(f, "pair id {id} was selected but has no live occurrence")
            }
            Self::ThreadPool(msg) => write!(f, "failed to build thread pool: {msg}"),
            Self::ProgressBarSetup(e) => write!(f, "template parsing failed: {e}"),
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<TemplateError> for TrainError {
    fn from(e: TemplateError) -> Self {
        Self::ProgressBarSetup(e)
    }
}

/// Errors raised by [`TrainerConfig::validate`](crate::config::TrainerConfig::validate).
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Construction needs at least one worker.
    ZeroThreads,
    /// Target vocabulary exceeds the token id ceiling.
    MaxTokensTooLarge(usize),
    /// Target vocabulary leaves no room for a single merge.
    MaxTokensTooSmall {
        max_tokens: usize,
        first_token: Token,
    },
    /// A pair seen once can never be worth merging.
    MinFrequencyTooLow(usize),
    /// Help tokens must lie below the first merge token.
    HelpTokensOverlap {
        n_help: Token,
        first_token: Token,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => write!(f, "thread count must be at least 1"),
            Self::MaxTokensTooLarge(n) => write!(
                f,
                "max tokens must not exceed {} (got {n})",
                crate::types::MAX_TOKEN_ID
            ),
            Self::MaxTokensTooSmall {
                max_tokens,
                first_token,
            } => write!(
                f,
                "max tokens {max_tokens} leaves no room for merges above token {first_token}"
            ),
            Self::MinFrequencyTooLow(n) => write!(f, "min frequency must be at least 2 (got {n})"),
            Self::HelpTokensOverlap {
                n_help,
                first_token,
            } => write!(
                f,
                "{n_help} help tokens overlap the first merge token {first_token}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur while reading raw sequence files.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    /// Format name not one of fasta, fastq, reads, trf.
    UnknownFormat(String),
    /// TRF line with fewer columns than expected.
    MalformedTrf {
        line: usize,
        columns: usize,
    },
    /// No sequence was found in the input.
    Empty,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read input: {e}"),
            Self::UnknownFormat(s) => write!(
                f,
                "invalid format: {s:?} (expected \"fasta\", \"fastq\", \"reads\" or \"trf\")"
            ),
            Self::MalformedTrf { line, columns } => write!(
                f,
                "TRF line {line} has {columns} columns, expected at least 15"
            ),
            Self::Empty => write!(f, "input contains no sequences"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors that can occur while writing vocabulary and report files.
#[derive(Debug)]
pub enum OutputError {
    Io(io::Error),
    Json(serde_json::Error),
    /// Token id has no string rendering in the alphabet or merge history.
    UnknownToken(Token),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to write output: {e}"),
            Self::Json(e) => write!(f, "failed to serialise tokenizer model: {e}"),
            Self::UnknownToken(t) => write!(f, "unknown token id: {t}"),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::UnknownToken(_) => None,
        }
    }
}

impl From<io::Error> for OutputError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for OutputError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
