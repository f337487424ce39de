// Rust guideline compliant 2026-10-17

//! Demo adapter for the `Scorer` port.
//!
//! Draws a uniform score in `[0, 1)` per transaction. Supports seeded
//! randomness for reproducible runs.

use std::cell::RefCell;

use domain::{Scorer, ScorerError, Transaction};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Stand-in for an external fraud model; the score ignores the transaction.
#[derive(Debug)]
pub struct RandomScorer {
    /// Interior mutability required because the port takes `&self`.
    rng: RefCell<StdRng>,
}

impl RandomScorer {
    /// `seed = Some(s)` produces deterministic scores; `None` seeds from the OS.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self { rng: RefCell::new(rng) }
    }
}

impl Scorer for RandomScorer {
    /// # Errors
    ///
    /// Currently infallible.
    async fn score(&self, tx: &Transaction) -> Result<f64, ScorerError> {
        let score: f64 = self.rng.borrow_mut().random();
        tracing::debug!(transaction_id = %tx.id, score, "random_scorer.score");
        Ok(score)
    }
}
