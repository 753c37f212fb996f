//! Morpheme-pattern base distributions.
//!
//! A pattern is an interned morpheme sequence containing exactly one STEM
//! placeholder. Both models here score pattern *ids* so they can serve as
//! dishes of a PYP node, looking the sequence up in their own pattern set.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::def::STEM;
use crate::prob::{DirichletMultinomial, GammaPoisson};
use crate::process::Process;

/// Interned morpheme sequences. Frozen by construction order: interning the
/// same sequence twice yields the same id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<usize>>", into = "Vec<Vec<usize>>")]
pub struct PatternSet {
    patterns: Vec<Vec<usize>>,
    index: HashMap<Vec<usize>, usize>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, pattern: Vec<usize>) -> usize {
        if let Some(&id) = self.index.get(&pattern) {
            return id;
        }
        let id = self.patterns.len();
        self.index.insert(pattern.clone(), id);
        self.patterns.push(pattern);
        id
    }

    pub fn lookup(&self, pattern: &[usize]) -> Option<usize> {
        self.index.get(pattern).cloned()
    }

    pub fn get(&self, id: usize) -> &[usize] {
        &self.patterns[id]
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl From<Vec<Vec<usize>>> for PatternSet {
    fn from(patterns: Vec<Vec<usize>>) -> Self {
        let index = patterns
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        Self { patterns, index }
    }
}

impl From<PatternSet> for Vec<Vec<usize>> {
    fn from(set: PatternSet) -> Self {
        set.patterns
    }
}

/// First-order Markov chain over the morphemes of a pattern, one
/// Dirichlet-Multinomial per left context. A synthetic boundary symbol
/// (id `K`) serves as both START and STOP; the STEM placeholder takes part
/// as an ordinary symbol, which is what anchors affixes to the stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramPattern {
    boundary: usize,
    morpheme_models: Vec<DirichletMultinomial>,
    patterns: PatternSet,
}

impl BigramPattern {
    pub fn new(n_morphemes: usize, prior: f64, patterns: PatternSet) -> Self {
        let boundary = n_morphemes;
        Self {
            boundary,
            morpheme_models: (0..n_morphemes + 1)
                .map(|_| DirichletMultinomial::new(n_morphemes + 1, prior))
                .collect(),
            patterns,
        }
    }
}

impl Process for BigramPattern {
    fn increment<R: Rng>(&mut self, pattern: usize, rng: &mut R) {
        let mut prev = self.boundary;
        for i in 0..self.patterns.get(pattern).len() {
            let m = self.patterns.get(pattern)[i];
            self.morpheme_models[prev].increment(m, rng);
            prev = m;
        }
        let boundary = self.boundary;
        self.morpheme_models[prev].increment(boundary, rng);
    }

    fn decrement<R: Rng>(&mut self, pattern: usize, rng: &mut R) {
        let mut prev = self.boundary;
        for i in 0..self.patterns.get(pattern).len() {
            let m = self.patterns.get(pattern)[i];
            self.morpheme_models[prev].decrement(m, rng);
            prev = m;
        }
        let boundary = self.boundary;
        self.morpheme_models[prev].decrement(boundary, rng);
    }

    fn log_prob(&self, pattern: usize) -> f64 {
        let mut lp = 0.0;
        let mut prev = self.boundary;
        for &m in self.patterns.get(pattern) {
            lp += self.morpheme_models[prev].log_prob(m);
            prev = m;
        }
        lp + self.morpheme_models[prev].log_prob(self.boundary)
    }

    fn log_likelihood(&self) -> f64 {
        self.morpheme_models.iter().map(|m| m.log_likelihood()).sum()
    }
}

/// Exchangeable bag of non-STEM morphemes plus a Gamma-Poisson over how many
/// there are. The STEM placeholder carries no information here and is
/// dropped from both the bag and the length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonUnigramPattern {
    morpheme_model: DirichletMultinomial,
    length_model: GammaPoisson,
    patterns: PatternSet,
}

impl PoissonUnigramPattern {
    pub fn new(
        n_morphemes: usize,
        prior: f64,
        length_shape: f64,
        length_rate: f64,
        patterns: PatternSet,
    ) -> Self {
        Self {
            morpheme_model: DirichletMultinomial::new(n_morphemes, prior),
            length_model: GammaPoisson::new(length_shape, length_rate),
            patterns,
        }
    }

    fn affix_count(&self, pattern: usize) -> usize {
        self.patterns.get(pattern).iter().filter(|&&m| m != STEM).count()
    }
}

impl Process for PoissonUnigramPattern {
    fn increment<R: Rng>(&mut self, pattern: usize, rng: &mut R) {
        let mut affixes = 0;
        for i in 0..self.patterns.get(pattern).len() {
            let m = self.patterns.get(pattern)[i];
            if m != STEM {
                self.morpheme_model.increment(m, rng);
                affixes += 1;
            }
        }
        self.length_model.increment(affixes, rng);
    }

    fn decrement<R: Rng>(&mut self, pattern: usize, rng: &mut R) {
        let mut affixes = 0;
        for i in 0..self.patterns.get(pattern).len() {
            let m = self.patterns.get(pattern)[i];
            if m != STEM {
                self.morpheme_model.decrement(m, rng);
                affixes += 1;
            }
        }
        self.length_model.decrement(affixes, rng);
    }

    fn log_prob(&self, pattern: usize) -> f64 {
        let affixes = self.affix_count(pattern);
        let weights: f64 = self
            .patterns
            .get(pattern)
            .iter()
            .filter(|&&m| m != STEM)
            .map(|&m| self.morpheme_model.pred_log_weight(m))
            .sum();
        weights
            + self.morpheme_model.log_gamma_factor(affixes)
            + self.length_model.log_prob(affixes)
    }

    fn log_likelihood(&self) -> f64 {
        self.morpheme_model.log_likelihood() + self.length_model.log_likelihood()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy_patterns() -> PatternSet {
        let mut set = PatternSet::new();
        assert_eq!(set.intern(vec![STEM]), 0);
        assert_eq!(set.intern(vec![STEM, 1]), 1);
        assert_eq!(set.intern(vec![2, STEM, 1]), 2);
        set
    }

    #[test]
    fn interning_is_idempotent() {
        let mut set = toy_patterns();
        assert_eq!(set.intern(vec![STEM, 1]), 1);
        assert_eq!(set.lookup(&[2, STEM, 1]), Some(2));
        assert_eq!(set.lookup(&[1, 2]), None);
        assert_eq!(set.get(1), &[STEM, 1]);
    }

    #[test]
    fn pattern_set_serde_rebuilds_the_index() {
        let set = toy_patterns();
        let json = serde_json::to_string(&set).unwrap();
        let back: PatternSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
        assert_eq!(back.lookup(&[STEM, 1]), Some(1));
    }

    #[test]
    fn bigram_prob_is_the_product_over_transitions() {
        // 3 morphemes (STEM, 1, 2), boundary id 3, alpha 1. On an empty
        // model every transition scores 1/4, so pattern [STEM, 1] costs
        // (1/4)^3: boundary->STEM, STEM->1, 1->boundary.
        let model = BigramPattern::new(3, 1.0, toy_patterns());
        assert!((model.log_prob(1) - 3.0 * (0.25f64).ln()).abs() < 1e-12);
        assert!((model.log_prob(0) - 2.0 * (0.25f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn bigram_counts_shift_the_transitions() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(11);
        let mut model = BigramPattern::new(3, 1.0, toy_patterns());
        model.increment(1, &mut rng);
        // boundary->STEM now has count 1 among 4 outcomes with alpha 1:
        // (1+1)/(4+1); STEM->1 likewise; 1->boundary likewise.
        assert!((model.log_prob(1) - 3.0 * (0.4f64).ln()).abs() < 1e-12);

        let fresh = BigramPattern::new(3, 1.0, toy_patterns());
        model.decrement(1, &mut rng);
        assert_eq!(model, fresh);
    }

    #[test]
    fn poisson_unigram_round_trips_and_skips_the_stem() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(12);
        let mut model = PoissonUnigramPattern::new(3, 1.0, 1.0, 1.0, toy_patterns());
        let fresh = model.clone();
        model.increment(2, &mut rng);
        assert_eq!(model.affix_count(2), 2);
        model.decrement(2, &mut rng);
        assert_eq!(model, fresh);

        // The trivial pattern has no affixes: only the length model speaks.
        let lp = model.log_prob(0);
        assert!((lp - model.length_model.log_prob(0)).abs() < 1e-12);
    }
}
