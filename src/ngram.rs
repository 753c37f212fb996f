//! Hierarchical Pitman-Yor n-gram model.
//!
//! A `PypLm` of order `n` keeps one restaurant per observed context of
//! length `n - 1`, all sharing that level's strength and discount, and backs
//! off into a `PypLm` of order `n - 1`; order 1 bottoms out at the supplied
//! base distribution. New-table and dropped-table events are forwarded to
//! the backoff under the context shifted by one position, which is what
//! produces n-gram smoothing without explicit interpolation weights.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crp::Crp;
use crate::process::{Base, Process};

/// What the trainer drives: a model over fixed-length id sequences.
pub trait SeqModel {
    fn order(&self) -> usize;
    fn increment<R: Rng>(&mut self, seq: &[usize], rng: &mut R);
    fn decrement<R: Rng>(&mut self, seq: &[usize], rng: &mut R);
    fn log_prob(&self, seq: &[usize]) -> f64;
    fn log_likelihood(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Backoff {
    Chain(Box<PypLm>),
    Base(Base),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PypLm {
    theta: f64,
    d: f64,
    order: usize,
    #[serde(with = "context_map")]
    models: HashMap<Vec<usize>, Crp>,
    backoff: Backoff,
}

impl PypLm {
    pub fn new(theta: f64, d: f64, order: usize, base: Base) -> Self {
        assert!(order >= 1);
        Self {
            theta,
            d,
            order,
            models: HashMap::new(),
            backoff: if order == 1 {
                Backoff::Base(base)
            } else {
                Backoff::Chain(Box::new(PypLm::new(theta, d, order - 1, base)))
            },
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The base distribution at the bottom of the backoff chain.
    pub fn base(&self) -> &Base {
        match &self.backoff {
            Backoff::Chain(lm) => lm.base(),
            Backoff::Base(base) => base,
        }
    }

    pub fn increment<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        let (&dish, context) = self.split(seq);
        let base_log_prob = self.backoff_log_prob(context, dish);
        let node = self
            .models
            .entry(context.to_vec())
            .or_insert_with(Crp::new);
        if node.increment(dish, self.theta, self.d, base_log_prob, rng) {
            self.backoff_increment(context, dish, rng);
        }
    }

    pub fn decrement<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        let (&dish, context) = self.split(seq);
        let node = self
            .models
            .get_mut(context)
            .expect("decrement of an unseen context");
        if node.decrement(dish, rng) {
            self.backoff_decrement(context, dish, rng);
        }
    }

    /// Predictive log-probability; never mutates, a context without a
    /// restaurant contributes exactly its backoff probability.
    pub fn log_prob(&self, seq: &[usize]) -> f64 {
        let (&dish, context) = self.split(seq);
        let base_log_prob = self.backoff_log_prob(context, dish);
        match self.models.get(context) {
            Some(node) => node.log_prob(dish, self.theta, self.d, base_log_prob),
            None => base_log_prob,
        }
    }

    /// Seating likelihoods of every restaurant at this level and below plus
    /// the base's own likelihood. Each level contributes its seating only;
    /// the shared backoff is counted once.
    pub fn log_likelihood(&self) -> f64 {
        let own: f64 = self
            .models
            .values()
            .map(|node| node.log_likelihood(self.theta, self.d))
            .sum();
        own + match &self.backoff {
            Backoff::Chain(lm) => lm.log_likelihood(),
            Backoff::Base(base) => Process::log_likelihood(base),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.models.values().all(|node| node.is_consistent())
            && match &self.backoff {
                Backoff::Chain(lm) => lm.is_consistent(),
                Backoff::Base(_) => true,
            }
    }

    fn split<'a>(&self, seq: &'a [usize]) -> (&'a usize, &'a [usize]) {
        assert_eq!(seq.len(), self.order, "sequence length must match order");
        seq.split_last().expect("non-empty sequence")
    }

    fn backoff_log_prob(&self, context: &[usize], dish: usize) -> f64 {
        match &self.backoff {
            Backoff::Chain(lm) => lm.log_prob(&shifted(context, dish)),
            Backoff::Base(base) => Process::log_prob(base, dish),
        }
    }

    fn backoff_increment<R: Rng>(&mut self, context: &[usize], dish: usize, rng: &mut R) {
        match &mut self.backoff {
            Backoff::Chain(lm) => lm.increment(&shifted(context, dish), rng),
            Backoff::Base(base) => Process::increment(base, dish, rng),
        }
    }

    fn backoff_decrement<R: Rng>(&mut self, context: &[usize], dish: usize, rng: &mut R) {
        match &mut self.backoff {
            Backoff::Chain(lm) => lm.decrement(&shifted(context, dish), rng),
            Backoff::Base(base) => Process::decrement(base, dish, rng),
        }
    }
}

/// The backoff view of a sequence: the context minus its oldest symbol,
/// followed by the dish.
fn shifted(context: &[usize], dish: usize) -> Vec<usize> {
    let mut seq = context[1..].to_vec();
    seq.push(dish);
    seq
}

impl SeqModel for PypLm {
    fn order(&self) -> usize {
        PypLm::order(self)
    }

    fn increment<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        PypLm::increment(self, seq, rng)
    }

    fn decrement<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        PypLm::decrement(self, seq, rng)
    }

    fn log_prob(&self, seq: &[usize]) -> f64 {
        PypLm::log_prob(self, seq)
    }

    fn log_likelihood(&self) -> f64 {
        PypLm::log_likelihood(self)
    }
}

/// A bare process as a unigram sequence model, for running the sampler over
/// a top-level process directly.
impl SeqModel for Base {
    fn order(&self) -> usize {
        1
    }

    fn increment<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        debug_assert_eq!(seq.len(), 1);
        Process::increment(self, seq[0], rng)
    }

    fn decrement<R: Rng>(&mut self, seq: &[usize], rng: &mut R) {
        debug_assert_eq!(seq.len(), 1);
        Process::decrement(self, seq[0], rng)
    }

    fn log_prob(&self, seq: &[usize]) -> f64 {
        debug_assert_eq!(seq.len(), 1);
        Process::log_prob(self, seq[0])
    }

    fn log_likelihood(&self) -> f64 {
        Process::log_likelihood(self)
    }
}

mod context_map {
    use super::Crp;
    use serde::ser::Serializer;
    use serde::{Deserialize, Deserializer, Serialize};
    use std::collections::HashMap;

    // JSON objects cannot be keyed by integer tuples; contexts are written
    // as a sorted pair list instead.
    pub fn serialize<S: Serializer>(
        map: &HashMap<Vec<usize>, Crp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut pairs: Vec<(&Vec<usize>, &Crp)> = map.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Vec<usize>, Crp>, D::Error> {
        let pairs: Vec<(Vec<usize>, Crp)> = Deserialize::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crp::Pyp;
    use crate::prob::Uniform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uniform_base(k: usize) -> Base {
        Base::Uniform(Uniform::new(k))
    }

    #[test]
    fn order_one_matches_a_standalone_pyp() {
        let theta = 1.0;
        let d = 0.5;
        let mut lm = PypLm::new(theta, d, 1, uniform_base(5));
        let mut pyp = Pyp::new(theta, d, uniform_base(5));
        let mut rng_a: StdRng = SeedableRng::seed_from_u64(31);
        let mut rng_b: StdRng = SeedableRng::seed_from_u64(31);

        let dishes = [0, 2, 2, 4, 2, 0, 1, 2, 2, 3];
        for &k in &dishes {
            PypLm::increment(&mut lm, &[k], &mut rng_a);
            Process::increment(&mut pyp, k, &mut rng_b);
        }
        for k in 0..5 {
            assert!((PypLm::log_prob(&lm, &[k]) - Process::log_prob(&pyp, k)).abs() < 1e-12);
        }
        assert_eq!(lm.models[&vec![]], *pyp.crp());
        assert!((PypLm::log_likelihood(&lm) - Process::log_likelihood(&pyp)).abs() < 1e-12);

        for &k in &dishes {
            PypLm::decrement(&mut lm, &[k], &mut rng_a);
            Process::decrement(&mut pyp, k, &mut rng_b);
        }
        assert_eq!(lm.models[&vec![]], *pyp.crp());
    }

    #[test]
    fn unseen_context_backs_off() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(32);
        let mut lm = PypLm::new(1.0, 0.5, 2, uniform_base(4));
        PypLm::increment(&mut lm, &[0, 3], &mut rng);
        // A context never observed: its probability equals the unigram
        // level's prediction for the dish.
        let p_backoff = match &lm.backoff {
            Backoff::Chain(unigram) => PypLm::log_prob(unigram, &[3]),
            Backoff::Base(_) => unreachable!(),
        };
        assert!((PypLm::log_prob(&lm, &[2, 3]) - p_backoff).abs() < 1e-12);
    }

    #[test]
    fn new_tables_propagate_down_the_chain() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(33);
        let mut lm = PypLm::new(1.0, 0.5, 3, uniform_base(4));
        PypLm::increment(&mut lm, &[0, 1, 2], &mut rng);
        // The first customer of a dish opens a table at every level.
        let bigram = match &lm.backoff {
            Backoff::Chain(lm) => lm,
            Backoff::Base(_) => unreachable!(),
        };
        let unigram = match &bigram.backoff {
            Backoff::Chain(lm) => lm,
            Backoff::Base(_) => unreachable!(),
        };
        assert_eq!(lm.models[&vec![0, 1]].customers_for(2), 1);
        assert_eq!(bigram.models[&vec![1]].customers_for(2), 1);
        assert_eq!(unigram.models[&vec![]].customers_for(2), 1);
        assert!(lm.is_consistent());
    }

    #[test]
    fn unwinding_restores_every_level() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(34);
        let mut lm = PypLm::new(1.0, 0.8, 2, uniform_base(6));
        let seqs = [[0, 2], [2, 3], [0, 2], [3, 3], [0, 2], [2, 3], [5, 1]];
        for seq in &seqs {
            PypLm::increment(&mut lm, seq, &mut rng);
        }
        assert!(lm.is_consistent());
        for seq in seqs.iter().rev() {
            PypLm::decrement(&mut lm, seq, &mut rng);
        }
        assert!(lm.is_consistent());
        assert!(PypLm::log_likelihood(&lm).abs() < 1e-12);
        for node in lm.models.values() {
            assert_eq!(node.num_customers(), 0);
        }
    }

    #[test]
    fn normalization_holds_through_two_levels() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(35);
        let k = 4;
        let mut lm = PypLm::new(0.7, 0.3, 2, uniform_base(k));
        for seq in &[[0, 1], [1, 2], [0, 1], [0, 3], [1, 1], [0, 1]] {
            PypLm::increment(&mut lm, seq, &mut rng);
        }
        for &ctx in &[0usize, 1, 2] {
            let total: f64 = (0..k).map(|w| PypLm::log_prob(&lm, &[ctx, w]).exp()).sum();
            assert!((total - 1.0).abs() < 1e-12, "context {}: {}", ctx, total);
        }
    }
}
