//! Incremental byte-pair-encoding trainer for genome-scale symbol sequences.
//!
//! Uses Algorithm 2 from "Byte Pair Encoding is Suboptimal for Language Model
//! Pretraining": every merge only touches the occurrences of the chosen pair
//! and their neighbours, so a run over a whole genome stays tractable.
//!
//! With the `python` feature this crate also builds a PyO3 extension module.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unused_must_use)]

pub mod alphabet;
mod build;
pub mod config;
pub mod error;
pub mod frequency;
pub mod interner;
pub mod output;
pub mod positions;
pub mod reader;
pub mod selector;
pub mod sequence;
pub mod state;
pub mod trainer;
pub mod types;

#[cfg(feature = "python")]
mod python;

pub use config::{TrainerBuilder, TrainerConfig};
pub use error::{ConfigError, OutputError, ReadError, TrainError};
pub use state::TrainingState;
pub use trainer::{Step, StopReason, Trainer};
pub use types::{BoundaryTokens, MergeRecord, PairId, Token, TokenPair};
