//! PyO3 bindings for the trainer.

use pyo3::{
    exceptions::{PyRuntimeError, PyValueError},
    prelude::*,
};

use crate::{
    config::TrainerConfig,
    error::TrainError,
    trainer::{Step, Trainer},
    types::Token,
};

fn to_py_err(e: TrainError) -> PyErr {
    match e {
        TrainError::Config(e) => PyValueError::new_err(e.to_string()),
        e => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Python wrapper for the sequence BPE trainer.
#[pyclass]
pub struct RustSeqTrainer {
    trainer: Trainer,
}

#[pymethods]
impl RustSeqTrainer {
    #[new]
    #[pyo3(signature = (tokens, first_token=11, n_help_tokens=7, n_threads=1))]
    fn new(
        tokens: Vec<Token>,
        first_token: Token,
        n_help_tokens: Token,
        n_threads: usize,
    ) -> PyResult<Self> {
        let cfg = TrainerConfig {
            first_token,
            n_help_tokens,
            n_threads,
            ..TrainerConfig::default()
        };
        let trainer = Trainer::new(&tokens, cfg).map_err(to_py_err)?;
        Ok(RustSeqTrainer { trainer })
    }

    /// Merges until token id `max_tokens` is assigned or training stops.
    ///
    /// Returns the stop reason, or `None` if the target was reached first.
    #[pyo3(signature = (max_tokens=None))]
    fn train(&mut self, max_tokens: Option<usize>) -> PyResult<Option<String>> {
        let stop = match max_tokens {
            Some(max) => self
                .trainer
                .train_until(max.saturating_add(1))
                .map_err(to_py_err)?,
            None => Some(self.trainer.train().map_err(to_py_err)?),
        };
        Ok(stop.map(|reason| reason.to_string()))
    }

    fn merge_step(&mut self) -> PyResult<bool> {
        let step = self.trainer.merge_step().map_err(to_py_err)?;
        Ok(matches!(step, Step::Merged(_)))
    }

    fn get_tokens(&self) -> PyResult<Vec<Token>> {
        self.trainer.tokens().map_err(to_py_err)
    }

    fn get_merge_history(&self) -> Vec<((Token, Token), Token)> {
        self.trainer
            .merges()
            .iter()
            .map(|r| ((r.pair.0, r.pair.1), r.token))
            .collect()
    }

    fn describe(&self) -> String {
        self.trainer.state().describe(5)
    }
}

#[pymodule]
fn seqbpe(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RustSeqTrainer>()?;
    Ok(())
}
