//! The process interface shared by every distribution in a model tree.
//!
//! A process is anything a PYP node can use as its base: it can seat a dish
//! (`increment`), undo exactly one previous seating (`decrement`), report a
//! predictive log-probability without mutating anything (`log_prob`), and
//! report the joint log-likelihood of everything currently seated in it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crp::Pyp;
use crate::morpho::MorphoProcess;
use crate::pattern::{BigramPattern, PoissonUnigramPattern};
use crate::prob::{CharLm, DirichletMultinomial, GammaPoisson, Uniform};

pub trait Process {
    fn increment<R: Rng>(&mut self, k: usize, rng: &mut R);
    fn decrement<R: Rng>(&mut self, k: usize, rng: &mut R);
    fn log_prob(&self, k: usize) -> f64;
    fn log_likelihood(&self) -> f64;
}

/// Closed set of base-distribution implementations. A tagged variant rather
/// than a trait object so the whole ownership tree can derive serde and
/// equality for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Base {
    Uniform(Uniform),
    Dirichlet(DirichletMultinomial),
    CharLm(CharLm),
    Pyp(Box<Pyp>),
    Bigram(BigramPattern),
    PoissonUnigram(PoissonUnigramPattern),
    Morpho(Box<MorphoProcess>),
}

impl Base {
    pub fn pyp(theta: f64, d: f64, base: Base) -> Base {
        Base::Pyp(Box::new(Pyp::new(theta, d, base)))
    }

    /// Descends through PYP wrappers to the morphological process, if this
    /// branch of the tree has one.
    pub fn morpho(&self) -> Option<&MorphoProcess> {
        match self {
            Base::Morpho(m) => Some(m),
            Base::Pyp(p) => p.base().morpho(),
            _ => None,
        }
    }
}

impl Process for Base {
    fn increment<R: Rng>(&mut self, k: usize, rng: &mut R) {
        match self {
            Base::Uniform(p) => p.increment(k, rng),
            Base::Dirichlet(p) => p.increment(k, rng),
            Base::CharLm(p) => p.increment(k, rng),
            Base::Pyp(p) => p.increment(k, rng),
            Base::Bigram(p) => p.increment(k, rng),
            Base::PoissonUnigram(p) => p.increment(k, rng),
            Base::Morpho(p) => p.increment(k, rng),
        }
    }

    fn decrement<R: Rng>(&mut self, k: usize, rng: &mut R) {
        match self {
            Base::Uniform(p) => p.decrement(k, rng),
            Base::Dirichlet(p) => p.decrement(k, rng),
            Base::CharLm(p) => p.decrement(k, rng),
            Base::Pyp(p) => p.decrement(k, rng),
            Base::Bigram(p) => p.decrement(k, rng),
            Base::PoissonUnigram(p) => p.decrement(k, rng),
            Base::Morpho(p) => p.decrement(k, rng),
        }
    }

    fn log_prob(&self, k: usize) -> f64 {
        match self {
            Base::Uniform(p) => p.log_prob(k),
            Base::Dirichlet(p) => p.log_prob(k),
            Base::CharLm(p) => p.log_prob(k),
            Base::Pyp(p) => p.log_prob(k),
            Base::Bigram(p) => p.log_prob(k),
            Base::PoissonUnigram(p) => p.log_prob(k),
            Base::Morpho(p) => p.log_prob(k),
        }
    }

    fn log_likelihood(&self) -> f64 {
        match self {
            Base::Uniform(p) => p.log_likelihood(),
            Base::Dirichlet(p) => p.log_likelihood(),
            Base::CharLm(p) => p.log_likelihood(),
            Base::Pyp(p) => p.log_likelihood(),
            Base::Bigram(p) => p.log_likelihood(),
            Base::PoissonUnigram(p) => p.log_likelihood(),
            Base::Morpho(p) => p.log_likelihood(),
        }
    }
}
