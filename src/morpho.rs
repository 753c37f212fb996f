//! Joint stem/pattern process with a latent analysis choice per token.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::prob::{log_mult_sample, log_sum_exp, remove_random};
use crate::process::{Base, Process};

/// Couples a stem sub-process and a pattern sub-process through the
/// candidate analyses of each word type. Every seated token remembers which
/// candidate it chose (`assignments`) so a later decrement can undo exactly
/// one earlier choice; which one is immaterial under exchangeability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphoProcess {
    stem_model: Base,
    pattern_model: Base,
    analyses: Vec<Vec<Analysis>>,
    assignments: HashMap<usize, Vec<usize>>,
}

impl MorphoProcess {
    pub fn new(stem_model: Base, pattern_model: Base, analyses: Vec<Vec<Analysis>>) -> Self {
        Self {
            stem_model,
            pattern_model,
            analyses,
            assignments: HashMap::new(),
        }
    }

    pub fn stem_model(&self) -> &Base {
        &self.stem_model
    }

    pub fn pattern_model(&self) -> &Base {
        &self.pattern_model
    }

    pub fn num_assigned(&self, k: usize) -> usize {
        self.assignments.get(&k).map_or(0, |a| a.len())
    }

    fn analysis_log_prob(&self, analysis: &Analysis) -> f64 {
        self.stem_model.log_prob(analysis.stem) + self.pattern_model.log_prob(analysis.pattern)
    }

    /// Highest-scoring analysis among `candidates` under the current
    /// sub-process state. Evaluation only; no mutation anywhere.
    pub fn best_analysis(&self, candidates: &[Analysis]) -> (f64, Analysis) {
        assert!(!candidates.is_empty(), "no candidate analyses to decode");
        candidates
            .iter()
            .map(|a| (self.analysis_log_prob(a), *a))
            .max_by(|(x, _), (y, _)| x.partial_cmp(y).expect("comparable log-probabilities"))
            .unwrap()
    }

    /// Arg-max analysis of a known word type.
    pub fn decode(&self, k: usize) -> (f64, Analysis) {
        self.best_analysis(&self.analyses[k])
    }
}

impl Process for MorphoProcess {
    fn increment<R: Rng>(&mut self, k: usize, rng: &mut R) {
        let i = {
            let candidates = &self.analyses[k];
            assert!(!candidates.is_empty(), "word type {} has no analyses", k);
            if candidates.len() == 1 {
                0
            } else {
                let log_weights: Vec<f64> = candidates
                    .iter()
                    .map(|a| self.analysis_log_prob(a))
                    .collect();
                log_mult_sample(&log_weights, rng)
            }
        };
        self.assignments.entry(k).or_insert_with(Vec::new).push(i);
        let analysis = self.analyses[k][i];
        self.stem_model.increment(analysis.stem, rng);
        self.pattern_model.increment(analysis.pattern, rng);
    }

    fn decrement<R: Rng>(&mut self, k: usize, rng: &mut R) {
        let i = {
            let assigned = self
                .assignments
                .get_mut(&k)
                .expect("decrement of a word type with no assignments");
            assert!(!assigned.is_empty(), "decrement of a word type with no assignments");
            remove_random(assigned, rng)
        };
        let analysis = self.analyses[k][i];
        self.stem_model.decrement(analysis.stem, rng);
        self.pattern_model.decrement(analysis.pattern, rng);
    }

    fn log_prob(&self, k: usize) -> f64 {
        let candidates = &self.analyses[k];
        assert!(!candidates.is_empty(), "word type {} has no analyses", k);
        let log_weights: Vec<f64> = candidates
            .iter()
            .map(|a| self.analysis_log_prob(a))
            .collect();
        log_sum_exp(&log_weights)
    }

    fn log_likelihood(&self) -> f64 {
        self.stem_model.log_likelihood() + self.pattern_model.log_likelihood()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::DirichletMultinomial;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy_process() -> MorphoProcess {
        // Word 0: unambiguous. Word 1: two candidate analyses.
        let analyses = vec![
            vec![Analysis { stem: 0, pattern: 0 }],
            vec![
                Analysis { stem: 1, pattern: 0 },
                Analysis { stem: 2, pattern: 1 },
            ],
        ];
        MorphoProcess::new(
            Base::Dirichlet(DirichletMultinomial::new(4, 1.0)),
            Base::Dirichlet(DirichletMultinomial::new(2, 1.0)),
            analyses,
        )
    }

    #[test]
    fn single_candidate_words_are_deterministic() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(21);
        let mut mp = toy_process();
        mp.increment(0, &mut rng);
        assert_eq!(mp.num_assigned(0), 1);
        assert_eq!(mp.assignments[&0], vec![0]);
    }

    #[test]
    fn increments_pair_with_decrements_exactly() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(22);
        let mut mp = toy_process();
        let fresh = mp.clone();
        let n = 8;
        for _ in 0..n {
            mp.increment(1, &mut rng);
        }
        assert_eq!(mp.num_assigned(1), n);
        for _ in 0..n {
            mp.decrement(1, &mut rng);
        }
        assert_eq!(mp.num_assigned(1), 0);
        assert_eq!(mp.stem_model, fresh.stem_model);
        assert_eq!(mp.pattern_model, fresh.pattern_model);
    }

    #[test]
    fn marginal_prob_sums_over_candidates() {
        let mp = toy_process();
        // Uninformed models: each analysis scores 1/4 * 1/2.
        assert!((mp.log_prob(1).exp() - 0.25).abs() < 1e-12);
        assert!((mp.log_prob(0).exp() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn decode_prefers_the_better_supported_analysis() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(23);
        let mut mp = toy_process();
        // Tilt the stem model towards stem 2.
        mp.stem_model.increment(2, &mut rng);
        mp.stem_model.increment(2, &mut rng);
        let (_, best) = mp.decode(1);
        assert_eq!(best, Analysis { stem: 2, pattern: 1 });
    }
}
