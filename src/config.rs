//! Trainer configuration.

use std::{num::NonZeroUsize, thread};

use crate::{
    alphabet::{ALPHABET_SIZE, N_HELP_TOKENS},
    error::ConfigError,
    types::{MAX_TOKEN_ID, Token},
};

/// Vocabulary sizes at which the command-line front-end writes a snapshot.
pub const DEFAULT_SNAPSHOT_POINTS: [usize; 7] = [512, 1024, 2048, 4096, 8192, 16384, 32768];

/// Settings for one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerConfig {
    /// Highest token id a merge may be assigned. `None` runs to the id ceiling.
    pub max_tokens: Option<usize>,
    /// Pairs seen fewer times than this are never merged.
    pub min_frequency: usize,
    /// Workers used while building the sequence list.
    pub n_threads: usize,
    /// Id given to the first merged token.
    pub first_token: Token,
    /// Tokens below this id separate sequences and are never merged.
    pub n_help_tokens: Token,
    pub show_progress: bool,
    pub snapshot_points: Vec<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            min_frequency: 2,
            n_threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            first_token: ALPHABET_SIZE,
            n_help_tokens: N_HELP_TOKENS,
            show_progress: false,
            snapshot_points: DEFAULT_SNAPSHOT_POINTS.to_vec(),
        }
    }
}

impl TrainerConfig {
    /// Returns a [`TrainerBuilder`] starting from the defaults.
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Checks that the settings leave room for at least one merge.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.min_frequency < 2 {
            return Err(ConfigError::MinFrequencyTooLow(self.min_frequency));
        }
        if self.n_help_tokens > self.first_token {
            return Err(ConfigError::HelpTokensOverlap {
                n_help: self.n_help_tokens,
                first_token: self.first_token,
            });
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens > MAX_TOKEN_ID {
                return Err(ConfigError::MaxTokensTooLarge(max_tokens));
            }
            if max_tokens < usize::from(self.first_token) {
                return Err(ConfigError::MaxTokensTooSmall {
                    max_tokens,
                    first_token: self.first_token,
                });
            }
        }
        Ok(())
    }

    /// Snapshot points a run can reach, ascending.
    ///
    /// A point `n` is reached once the next token id equals `n`, so only
    /// points above `first_token` and at most one past `max_tokens` count.
    pub fn snapshot_schedule(&self) -> Vec<usize> {
        let last = self.max_tokens.unwrap_or(MAX_TOKEN_ID).saturating_add(1);
        let mut points: Vec<usize> = self
            .snapshot_points
            .iter()
            .copied()
            .filter(|&n| n > usize::from(self.first_token) && n <= last)
            .collect();
        points.sort_unstable();
        points.dedup();
        points
    }
}

/// Chained setters over [`TrainerConfig`]; [`build`](Self::build) validates.
#[derive(Debug, Clone, Default)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.cfg.max_tokens = Some(max_tokens);
        self
    }

    pub fn min_frequency(mut self, min_frequency: usize) -> Self {
        self.cfg.min_frequency = min_frequency;
        self
    }

    pub fn n_threads(mut self, n_threads: usize) -> Self {
        self.cfg.n_threads = n_threads;
        self
    }

    pub fn first_token(mut self, first_token: Token) -> Self {
        self.cfg.first_token = first_token;
        self
    }

    pub fn n_help_tokens(mut self, n_help_tokens: Token) -> Self {
        self.cfg.n_help_tokens = n_help_tokens;
        self
    }

    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.cfg.show_progress = show_progress;
        self
    }

    pub fn snapshot_points(mut self, points: Vec<usize>) -> Self {
        self.cfg.snapshot_points = points;
        self
    }

    pub fn build(self) -> Result<TrainerConfig, ConfigError> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = TrainerConfig::default();
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.min_frequency, 2);
        assert_eq!(cfg.first_token, 11);
        assert_eq!(cfg.n_help_tokens, 7);
        assert!(cfg.n_threads >= 1);
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        assert_eq!(
            TrainerConfig::builder().n_threads(0).build(),
            Err(ConfigError::ZeroThreads)
        );
        assert_eq!(
            TrainerConfig::builder().min_frequency(1).build(),
            Err(ConfigError::MinFrequencyTooLow(1))
        );
        assert_eq!(
            TrainerConfig::builder().max_tokens(70_000).build(),
            Err(ConfigError::MaxTokensTooLarge(70_000))
        );
        assert_eq!(
            TrainerConfig::builder().max_tokens(5).build(),
            Err(ConfigError::MaxTokensTooSmall {
                max_tokens: 5,
                first_token: 11
            })
        );
        assert_eq!(
            TrainerConfig::builder().n_help_tokens(12).build(),
            Err(ConfigError::HelpTokensOverlap {
                n_help: 12,
                first_token: 11
            })
        );
    }

    #[test]
    fn test_builder_keeps_settings() {
        let cfg = TrainerConfig::builder()
            .max_tokens(600)
            .n_threads(3)
            .show_progress(true)
            .build()
            .expect("settings are valid");
        assert_eq!(cfg.max_tokens, Some(600));
        assert_eq!(cfg.n_threads, 3);
        assert!(cfg.show_progress);
    }

    #[test]
    fn test_snapshot_schedule() {
        let cfg = TrainerConfig::builder()
            .snapshot_points(vec![2048, 512, 8, 512, 1024])
            .max_tokens(1500)
            .build()
            .expect("settings are valid");
        assert_eq!(cfg.snapshot_schedule(), vec![512, 1024]);

        let cfg = TrainerConfig::builder()
            .max_tokens(1023)
            .build()
            .expect("settings are valid");
        assert_eq!(cfg.snapshot_schedule(), vec![512, 1024]);
    }
}
