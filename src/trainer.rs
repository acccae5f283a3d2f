//! Merge loop.
//!
//! Repeatedly selects the most frequent live pair and collapses it into a
//! fresh token until a stop condition holds. Each step is
//! `O(k log V)` in the number `k` of occurrences touched, instead of a
//! full rescan of the sequence.

use std::{fmt, time::Instant};

use indicatif::{ProgressBar, ProgressStyle, style::TemplateError};
use log::{debug, info};

use crate::{
    config::TrainerConfig,
    error::TrainError,
    state::TrainingState,
    types::{BoundaryTokens, MAX_TOKEN_ID, MergeRecord, Token},
};

/// Why the merge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The best pair occurs fewer than `min_frequency` times.
    BelowMinFrequency,
    /// The next token id would exceed `max_tokens`.
    MaxTokensReached,
    /// The next token id does not fit in a [`Token`].
    TokenSpaceExhausted,
    /// No mergeable pair is left.
    NoPairs,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BelowMinFrequency => "best pair is below the minimum frequency",
            Self::MaxTokensReached => "target vocabulary size reached",
            Self::TokenSpaceExhausted => "token id space exhausted",
            Self::NoPairs => "no mergeable pairs left",
        };
        f.write_str(text)
    }
}

/// Outcome of one [`Trainer::merge_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Merged(MergeRecord),
    Stopped(StopReason),
}

/// Incremental BPE trainer over one token sequence.
#[derive(Debug)]
pub struct Trainer {
    cfg: TrainerConfig,
    state: TrainingState,
    /// Id the next merge will be assigned; may pass [`MAX_TOKEN_ID`].
    next_token: usize,
    merges: Vec<MergeRecord>,
    stopped: Option<StopReason>,
}

impl Trainer {
    /// Validates `cfg` and builds the training state for `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::Config`] for an invalid configuration, or any
    /// construction error raised while building the sequence list.
    pub fn new(tokens: &[Token], cfg: TrainerConfig) -> Result<Self, TrainError> {
        cfg.validate()?;
        let boundary = BoundaryTokens::new(cfg.n_help_tokens);
        let state = TrainingState::build(tokens, boundary, cfg.n_threads)?;
        info!(
            "{} distinct pairs, {} mergeable",
            state.interner().len(),
            state.table().live_pairs()
        );
        Ok(Self {
            next_token: usize::from(cfg.first_token),
            cfg,
            state,
            merges: Vec::new(),
            stopped: None,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Merges learned so far, in order.
    pub fn merges(&self) -> &[MergeRecord] {
        &self.merges
    }

    /// Id the next merge would receive.
    pub fn next_token(&self) -> usize {
        self.next_token
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Current token sequence.
    pub fn tokens(&self) -> Result<Vec<Token>, TrainError> {
        self.state.to_tokens()
    }

    /// Performs one merge, or reports why none is possible.
    ///
    /// Once stopped, every further call returns the same [`Step::Stopped`].
    pub fn merge_step(&mut self) -> Result<Step, TrainError> {
        if let Some(reason) = self.stopped {
            return Ok(Step::Stopped(reason));
        }
        let step = self.try_merge()?;
        if let Step::Stopped(reason) = step {
            info!("stopping after {} merges: {reason}", self.merges.len());
            self.stopped = Some(reason);
        }
        Ok(step)
    }

    fn try_merge(&mut self) -> Result<Step, TrainError> {
        let Some((pair_id, freq)) = self.state.most_frequent_pair()? else {
            return Ok(Step::Stopped(StopReason::NoPairs));
        };
        if freq < self.cfg.min_frequency {
            return Ok(Step::Stopped(StopReason::BelowMinFrequency));
        }
        if self.cfg.max_tokens.is_some_and(|max| self.next_token > max) {
            return Ok(Step::Stopped(StopReason::MaxTokensReached));
        }
        let Ok(token) = Token::try_from(self.next_token) else {
            return Ok(Step::Stopped(StopReason::TokenSpaceExhausted));
        };

        let pair = self.state.pair_of(pair_id)?;
        let collapsed = self.state.collapse(pair_id, token)?;
        if collapsed == 0 {
            return Err(TrainError::NothingCollapsed(pair_id));
        }

        let record = MergeRecord {
            pair_id,
            pair,
            token,
            freq,
        };
        self.merges.push(record);
        self.next_token += 1;

        debug!(
            "merged ({}, {}) -> {token}: freq {freq}, collapsed {collapsed}, length {}",
            pair.0,
            pair.1,
            self.state.sequence_len()
        );
        Ok(Step::Merged(record))
    }

    /// Merges until a stop condition holds.
    pub fn train(&mut self) -> Result<StopReason, TrainError> {
        // ids stop at the token ceiling, so `usize::MAX` is never reached
        let reason = self.train_until(usize::MAX)?;
        Ok(reason.unwrap_or(StopReason::TokenSpaceExhausted))
    }

    /// Merges until the next token id reaches `n` or a stop condition holds.
    ///
    /// Returns `None` when `n` was reached without stopping.
    pub fn train_until(&mut self, n: usize) -> Result<Option<StopReason>, TrainError> {
        if let Some(reason) = self.stopped {
            return Ok(Some(reason));
        }
        let limit = self
            .cfg
            .max_tokens
            .unwrap_or(MAX_TOKEN_ID)
            .saturating_add(1)
            .min(n);
        let budget = limit.saturating_sub(self.next_token) as u64;

        let pb = if self.cfg.show_progress {
            progress_bar(budget, "Learning merges")?
        } else {
            // create dummy progress bar and force to not render
            let pb = ProgressBar::new(budget);
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
            pb
        };

        let start = Instant::now();
        let merged_before = self.merges.len();
        let mut stop = None;
        while self.next_token < n {
            match self.merge_step()? {
                Step::Merged(_) => pb.inc(1),
                Step::Stopped(reason) => {
                    stop = Some(reason);
                    break;
                }
            }
        }
        pb.finish_and_clear();

        info!(
            "learned {} merges in {:.2?}; vocabulary {}, sequence length {}",
            self.merges.len() - merged_before,
            start.elapsed(),
            self.next_token,
            self.state.sequence_len()
        );
        Ok(stop)
    }
}

/// Progress bar showing elapsed time, a fixed-width label and position/total.
///
/// # Errors
///
/// Returns a [`TemplateError`] if the progress bar style template is invalid.
fn progress_bar(size: u64, msg: impl Into<String>) -> Result<ProgressBar, TemplateError> {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {msg:<30!} {wide_bar} {pos}/{len}")?;
    pb.set_style(style);
    pb.set_message(msg.into());
    pb.enable_steady_tick(std::time::Duration::from_secs(1));
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Token = 7;
    const B: Token = 8;

    fn trainer(tokens: &[Token]) -> Trainer {
        let cfg = TrainerConfig::builder()
            .n_threads(1)
            .build()
            .expect("settings are valid");
        Trainer::new(tokens, cfg).expect("trainer builds")
    }

    #[test]
    fn test_stops_below_min_frequency() {
        let mut t = trainer(&[A, A, A, B]);
        match t.merge_step().expect("step succeeds") {
            Step::Merged(r) => {
                assert_eq!(r.pair.0, A);
                assert_eq!(r.pair.1, A);
                assert_eq!((r.token, r.freq), (11, 2));
            }
            Step::Stopped(reason) => panic!("unexpected stop: {reason}"),
        }
        assert_eq!(
            t.merge_step().expect("step succeeds"),
            Step::Stopped(StopReason::BelowMinFrequency)
        );
        assert_eq!(t.tokens().expect("chain is intact"), vec![11, A, B]);
        assert_eq!(t.merges().len(), 1);
    }

    #[test]
    fn test_train_alternating() {
        let mut t = trainer(&[A, B, A, B, A, B]);
        let reason = t.train().expect("training succeeds");
        assert_eq!(reason, StopReason::BelowMinFrequency);
        let tokens: Vec<_> = t.merges().iter().map(|r| (r.pair.0, r.pair.1, r.token)).collect();
        assert_eq!(tokens, vec![(A, B, 11), (11, 11, 12)]);
        assert_eq!(t.tokens().expect("chain is intact"), vec![12, 11]);
    }

    #[test]
    fn test_max_tokens_bounds_last_id() {
        let cfg = TrainerConfig::builder()
            .n_threads(1)
            .max_tokens(11)
            .build()
            .expect("settings are valid");
        let mut t = Trainer::new(&[A, B, A, B, A, B, A, B], cfg).expect("trainer builds");
        assert_eq!(t.train().expect("training succeeds"), StopReason::MaxTokensReached);
        assert_eq!(t.merges().len(), 1);
        assert_eq!(t.next_token(), 12);
    }

    #[test]
    fn test_token_space_exhausted() {
        let cfg = TrainerConfig::builder()
            .n_threads(1)
            .first_token(Token::MAX)
            .build()
            .expect("settings are valid");
        let mut t = Trainer::new(&[A, A, A, A, A, A], cfg).expect("trainer builds");
        assert_eq!(t.train().expect("training succeeds"), StopReason::TokenSpaceExhausted);
        assert_eq!(t.merges().len(), 1);
        assert_eq!(t.merges()[0].token, Token::MAX);
    }

    #[test]
    fn test_no_pairs_and_sticky_stop() {
        let mut t = trainer(&[A, 5, B]);
        assert_eq!(
            t.merge_step().expect("step succeeds"),
            Step::Stopped(StopReason::NoPairs)
        );
        assert_eq!(t.stop_reason(), Some(StopReason::NoPairs));
        assert_eq!(
            t.merge_step().expect("step succeeds"),
            Step::Stopped(StopReason::NoPairs)
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let cfg = TrainerConfig {
            n_threads: 0,
            ..TrainerConfig::default()
        };
        match Trainer::new(&[A, B], cfg) {
            Err(TrainError::Config(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_train_until_target() {
        let seq: Vec<Token> = [A, B, 9, 10].iter().copied().cycle().take(64).collect();
        let mut t = trainer(&seq);
        assert_eq!(t.train_until(13).expect("training succeeds"), None);
        assert_eq!(t.next_token(), 13);
        t.state().check_consistency().expect("counts are exact");
    }

    #[test]
    fn test_progress_bar_template() {
        progress_bar(10, "Learning merges").expect("template parses");
    }
}
