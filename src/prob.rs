//! Log-domain sampling primitives and the leaf base distributions.
//!
//! Every distribution here exposes the process interface of
//! [`crate::process::Process`]; probabilities are always log-probabilities
//! and mixtures are combined with log-sum-exp, never with plain products.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::corpus::Vocabulary;
use crate::def::STOP;
use crate::error::Error;
use crate::process::Process;

/// Stable `ln(sum(exp(xs)))`. Returns negative infinity for an empty slice
/// or when every entry is negative infinity.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let m = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if m == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    m + xs.iter().map(|&x| (x - m).exp()).sum::<f64>().ln()
}

/// Stable `ln(exp(a) + exp(b))`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Draws an index proportionally to `exp(log_weights)`. A single option is
/// returned directly without consuming randomness, so degenerate choices
/// stay deterministic under a fixed seed.
pub fn log_mult_sample<R: Rng>(log_weights: &[f64], rng: &mut R) -> usize {
    assert!(!log_weights.is_empty(), "sampling from an empty support");
    if log_weights.len() == 1 {
        return 0;
    }
    let m = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!(m > f64::NEG_INFINITY, "all options have zero probability");
    let weights: Vec<f64> = log_weights.iter().map(|&lw| (lw - m).exp()).collect();
    let total: f64 = weights.iter().sum();
    let mut x = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        if x < *w {
            return i;
        }
        x -= *w;
    }
    log_weights.len() - 1
}

/// Removes and returns a uniformly random element.
pub fn remove_random<T, R: Rng>(items: &mut Vec<T>, rng: &mut R) -> T {
    assert!(!items.is_empty(), "removing from an empty assignment list");
    let i = rng.gen_range(0, items.len());
    items.swap_remove(i)
}

/// Uniform distribution over a fixed support of `n` outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uniform {
    n: usize,
    count: usize,
}

impl Uniform {
    pub fn new(n: usize) -> Self {
        assert!(n > 0);
        Self { n, count: 0 }
    }
}

impl Process for Uniform {
    fn increment<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        assert!(k < self.n, "dish {} outside uniform support {}", k, self.n);
        self.count += 1;
    }

    fn decrement<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        assert!(k < self.n, "dish {} outside uniform support {}", k, self.n);
        assert!(self.count > 0, "decrement of an empty uniform base");
        self.count -= 1;
    }

    fn log_prob(&self, k: usize) -> f64 {
        assert!(k < self.n, "dish {} outside uniform support {}", k, self.n);
        -(self.n as f64).ln()
    }

    fn log_likelihood(&self) -> f64 {
        -(self.count as f64) * (self.n as f64).ln()
    }
}

/// Multinomial over `k` outcomes with a symmetric Dirichlet(alpha) prior,
/// collapsed to its predictive form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletMultinomial {
    k: usize,
    alpha: f64,
    count: Vec<usize>,
    n: usize,
}

impl DirichletMultinomial {
    pub fn new(k: usize, alpha: f64) -> Self {
        assert!(k > 0);
        assert!(alpha > 0.0);
        Self {
            k,
            alpha,
            count: vec![0; k],
            n: 0,
        }
    }

    /// Unnormalized predictive log-weight `ln(alpha + count[k])`.
    pub fn pred_log_weight(&self, k: usize) -> f64 {
        assert!(k < self.k, "dish {} outside multinomial support {}", k, self.k);
        (self.alpha + self.count[k] as f64).ln()
    }

    /// Log of the shared normalizer for seating `n` more observations at
    /// once: `Gamma(K*alpha + N) / Gamma(K*alpha + N + n)`.
    pub fn log_gamma_factor(&self, n: usize) -> f64 {
        let mass = self.k as f64 * self.alpha + self.n as f64;
        match n {
            0 => 0.0,
            1 => -mass.ln(),
            _ => ln_gamma(mass) - ln_gamma(mass + n as f64),
        }
    }
}

impl Process for DirichletMultinomial {
    fn increment<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        assert!(k < self.k, "dish {} outside multinomial support {}", k, self.k);
        self.count[k] += 1;
        self.n += 1;
    }

    fn decrement<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        assert!(k < self.k, "dish {} outside multinomial support {}", k, self.k);
        assert!(self.count[k] > 0, "decrement of unobserved dish {}", k);
        self.count[k] -= 1;
        self.n -= 1;
    }

    fn log_prob(&self, k: usize) -> f64 {
        assert!(k < self.k, "dish {} outside multinomial support {}", k, self.k);
        ((self.alpha + self.count[k] as f64) / (self.k as f64 * self.alpha + self.n as f64)).ln()
    }

    fn log_likelihood(&self) -> f64 {
        let ka = self.k as f64 * self.alpha;
        ln_gamma(ka) - ln_gamma(ka + self.n as f64)
            + self
                .count
                .iter()
                .map(|&c| ln_gamma(self.alpha + c as f64))
                .sum::<f64>()
            - self.k as f64 * ln_gamma(self.alpha)
    }
}

fn log_binomial_coeff(k: usize, n: f64) -> f64 {
    match k {
        0 => 0.0,
        1 => n.ln(),
        _ => ln_gamma(n + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma(n - k as f64 + 1.0),
    }
}

/// Poisson over non-negative lengths with a Gamma(shape, rate) prior on its
/// rate, collapsed to the negative-binomial predictive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaPoisson {
    shape: f64,
    rate: f64,
    total_length: usize,
    n: usize,
    // Observed length multiset, needed for the exact marginal likelihood.
    length_counts: HashMap<usize, usize>,
}

impl GammaPoisson {
    pub fn new(shape: f64, rate: f64) -> Self {
        assert!(shape > 0.0);
        assert!(rate > 0.0);
        Self {
            shape,
            rate,
            total_length: 0,
            n: 0,
            length_counts: HashMap::new(),
        }
    }
}

impl Process for GammaPoisson {
    fn increment<R: Rng>(&mut self, l: usize, _rng: &mut R) {
        self.total_length += l;
        self.n += 1;
        *self.length_counts.entry(l).or_insert(0) += 1;
    }

    fn decrement<R: Rng>(&mut self, l: usize, _rng: &mut R) {
        let c = self.length_counts.get_mut(&l);
        let c = c.expect("decrement of unobserved length");
        assert!(*c > 0);
        *c -= 1;
        if *c == 0 {
            self.length_counts.remove(&l);
        }
        self.total_length -= l;
        self.n -= 1;
    }

    fn log_prob(&self, l: usize) -> f64 {
        let r = self.total_length as f64 + self.shape;
        let p = 1.0 / (self.n as f64 + self.rate + 1.0);
        log_binomial_coeff(l, l as f64 + r - 1.0) + r * (1.0 - p).ln() + l as f64 * p.ln()
    }

    fn log_likelihood(&self) -> f64 {
        let l = self.total_length as f64;
        ln_gamma(l + self.shape) - ln_gamma(self.shape) + self.shape * self.rate.ln()
            - (l + self.shape) * (self.n as f64 + self.rate).ln()
            - self
                .length_counts
                .iter()
                .map(|(&len, &c)| c as f64 * ln_gamma(len as f64 + 1.0))
                .sum::<f64>()
    }
}

/// Character-sequence probability oracle over a fixed stem inventory.
///
/// Scores are fixed at construction; `increment`/`decrement` only keep
/// reference counts so the likelihood of the seated stems is exact. The
/// STOP stem scores log 1 so sentence-end events cost nothing here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharLm {
    log_probs: Vec<f64>,
    counts: HashMap<usize, usize>,
}

impl CharLm {
    pub fn from_scores(log_probs: Vec<f64>) -> Self {
        Self {
            log_probs,
            counts: HashMap::new(),
        }
    }

    /// Uniform character model: each character of a stem is drawn uniformly
    /// from the inventory's alphabet extended with an end symbol.
    pub fn uniform(stems: &Vocabulary) -> Self {
        let mut alphabet = std::collections::HashSet::new();
        for id in 0..stems.len() {
            for c in stems.get(id).chars() {
                alphabet.insert(c);
            }
        }
        let char_lp = -((alphabet.len() + 1) as f64).ln();
        let log_probs = (0..stems.len())
            .map(|id| (stems.get(id).chars().count() + 1) as f64 * char_lp)
            .collect();
        Self::from_scores(log_probs)
    }

    /// Reads precomputed `stem <TAB> log10 probability` lines; stems missing
    /// from the file keep their uniform character-model score.
    pub fn from_score_file(path: &Path, stems: &Vocabulary) -> Result<Self, Error> {
        let mut lm = Self::uniform(stems);
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, '\t');
            let stem = parts.next().unwrap_or("");
            let score = parts
                .next()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| Error::BadTableLine(line.clone()))?;
            if let Some(id) = stems.lookup(stem) {
                lm.log_probs[id] = score * std::f64::consts::LN_10;
            }
        }
        Ok(lm)
    }
}

impl Process for CharLm {
    fn increment<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        assert!(k < self.log_probs.len(), "stem {} outside inventory", k);
        *self.counts.entry(k).or_insert(0) += 1;
    }

    fn decrement<R: Rng>(&mut self, k: usize, _rng: &mut R) {
        let c = self.counts.get_mut(&k).expect("decrement of unseen stem");
        assert!(*c > 0);
        *c -= 1;
        if *c == 0 {
            self.counts.remove(&k);
        }
    }

    fn log_prob(&self, k: usize) -> f64 {
        if k == STOP {
            return 0.0;
        }
        assert!(k < self.log_probs.len(), "stem {} outside inventory", k);
        self.log_probs[k]
    }

    fn log_likelihood(&self) -> f64 {
        self.counts
            .iter()
            .map(|(&k, &c)| c as f64 * self.log_prob(k))
            .sum()
    }
}
