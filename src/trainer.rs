//! Collapsed Gibbs training over a corpus.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::corpus::{ngrams, Corpus};
use crate::ngram::SeqModel;

/// Owns the model and the run's random state. One `run` call is one batch
/// job: a fixed number of sweeps, no convergence test, diagnostics once per
/// sweep through read-only calls.
pub struct Trainer<M: SeqModel> {
    model: M,
    rng: StdRng,
}

impl<M: SeqModel> Trainer<M> {
    pub fn new(model: M, seed: u64) -> Self {
        Self {
            model,
            rng: SeedableRng::seed_from_u64(seed),
        }
    }

    /// Runs `n_iter` sweeps. The first sweep only seats tokens; every later
    /// sweep removes each token's previous seat and immediately resamples it
    /// against the reduced counts, which is the collapsed Gibbs step for an
    /// exchangeable seating model. Sentences are visited in a fresh random
    /// order each sweep.
    pub fn run(&mut self, corpus: &Corpus, n_iter: usize) {
        let order = self.model.order();
        let mut indices: Vec<usize> = (0..corpus.num_sentences()).collect();
        for it in 0..n_iter {
            indices.shuffle(&mut self.rng);
            for &si in &indices {
                for seq in ngrams(corpus.sentence(si), order) {
                    if it > 0 {
                        self.model.decrement(&seq, &mut self.rng);
                    }
                    self.model.increment(&seq, &mut self.rng);
                }
            }
            let ll = self.model.log_likelihood();
            let ppl = (-ll / corpus.len() as f64).exp();
            info!(
                "iteration {}/{}: log-likelihood {:.2} perplexity {:.3}",
                it + 1,
                n_iter,
                ll,
                ppl
            );
        }
    }

    /// Held-out perplexity; reads the model, never mutates it.
    pub fn perplexity(&self, corpus: &Corpus) -> f64 {
        perplexity(&self.model, corpus)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

/// Per-token perplexity of `corpus` under `model`, boundary events included.
pub fn perplexity<M: SeqModel>(model: &M, corpus: &Corpus) -> f64 {
    let order = model.order();
    let mut log_likelihood = 0.0;
    let mut n_tokens = 0usize;
    for sentence in corpus.sentences() {
        for seq in ngrams(sentence, order) {
            log_likelihood += model.log_prob(&seq);
            n_tokens += 1;
        }
    }
    if n_tokens == 0 {
        return 0.0;
    }
    (-log_likelihood / n_tokens as f64).exp()
}
