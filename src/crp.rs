//! Chinese-restaurant seating state and the Pitman-Yor process node.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::prob::{log_add_exp, log_mult_sample};
use crate::process::{Base, Process};

/// Exchangeable seating state of one restaurant. Tables of a dish are kept
/// only as sizes; empty tables are dropped immediately and a dish with no
/// tables leaves both maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Crp {
    tablegroups: HashMap<usize, Vec<usize>>,
    ncustomers: HashMap<usize, usize>,
    ntables: usize,
    total_customers: usize,
}

impl Crp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_tables(&self) -> usize {
        self.ntables
    }

    pub fn num_customers(&self) -> usize {
        self.total_customers
    }

    pub fn customers_for(&self, dish: usize) -> usize {
        self.ncustomers.get(&dish).cloned().unwrap_or(0)
    }

    pub fn tables_for(&self, dish: usize) -> usize {
        self.tablegroups.get(&dish).map_or(0, |t| t.len())
    }

    fn seat_to(&mut self, dish: usize, table: Option<usize>) -> bool {
        let tables = self.tablegroups.entry(dish).or_insert_with(Vec::new);
        *self.ncustomers.entry(dish).or_insert(0) += 1;
        self.total_customers += 1;
        match table {
            None => {
                self.ntables += 1;
                tables.push(1);
                true
            }
            Some(i) => {
                tables[i] += 1;
                false
            }
        }
    }

    fn unseat_from(&mut self, dish: usize, table: usize) -> bool {
        let tables = self.tablegroups.get_mut(&dish).expect("unseat of unseen dish");
        tables[table] -= 1;
        *self.ncustomers.get_mut(&dish).expect("unseat of unseen dish") -= 1;
        self.total_customers -= 1;
        if tables[table] == 0 {
            tables.remove(table);
            self.ntables -= 1;
            if tables.is_empty() {
                self.tablegroups.remove(&dish);
                self.ncustomers.remove(&dish);
            }
            return true;
        }
        false
    }

    /// Seats one customer of `dish`, choosing between existing tables
    /// (weight `size - d`) and a new table (weight `(theta + d*T) *
    /// exp(base_log_prob)`). An unseen dish necessarily opens a new table.
    /// Returns whether a new table was opened, in which case the caller must
    /// forward the dish to its base.
    pub fn increment<R: Rng>(
        &mut self,
        dish: usize,
        theta: f64,
        d: f64,
        base_log_prob: f64,
        rng: &mut R,
    ) -> bool {
        let choice = match self.tablegroups.get(&dish) {
            None => None,
            Some(tables) => {
                let mut log_weights: Vec<f64> =
                    tables.iter().map(|&n| (n as f64 - d).ln()).collect();
                log_weights.push((theta + d * self.ntables as f64).ln() + base_log_prob);
                let i = log_mult_sample(&log_weights, rng);
                if i == tables.len() {
                    None
                } else {
                    Some(i)
                }
            }
        };
        self.seat_to(dish, choice)
    }

    /// Removes a uniformly random customer of `dish`; tables are hit
    /// proportionally to their size. Returns whether the customer's table
    /// became empty, in which case the caller must forward the removal to
    /// its base. Decrementing an unseated dish is a programming error.
    pub fn decrement<R: Rng>(&mut self, dish: usize, rng: &mut R) -> bool {
        let n = self.customers_for(dish);
        assert!(n > 0, "decrement of dish {} with no customers", dish);
        let mut j = rng.gen_range(0, n);
        let tables = &self.tablegroups[&dish];
        let mut table = tables.len() - 1;
        for (i, &size) in tables.iter().enumerate() {
            if j < size {
                table = i;
                break;
            }
            j -= size;
        }
        self.unseat_from(dish, table)
    }

    /// Marginal predictive log-probability given the base's log-probability
    /// for the same dish.
    pub fn log_prob(&self, dish: usize, theta: f64, d: f64, base_log_prob: f64) -> f64 {
        let new_table = (theta + d * self.ntables as f64).ln() + base_log_prob;
        let w = match self.tablegroups.get(&dish) {
            Some(tables) => {
                let seated = self.ncustomers[&dish] as f64 - d * tables.len() as f64;
                log_add_exp(new_table, seated.ln())
            }
            None => new_table,
        };
        w - (theta + self.total_customers as f64).ln()
    }

    /// Pitman-Yor exchangeable-partition log-probability of the current
    /// seating. `d == 0` uses the Dirichlet-process form directly; the
    /// general expression degenerates through `theta / d`.
    pub fn log_likelihood(&self, theta: f64, d: f64) -> f64 {
        let n = self.total_customers as f64;
        let t = self.ntables as f64;
        let table_sizes = self.tablegroups.values().flatten();
        if d == 0.0 {
            ln_gamma(theta) - ln_gamma(theta + n)
                + t * theta.ln()
                + table_sizes.map(|&s| ln_gamma(s as f64)).sum::<f64>()
        } else {
            ln_gamma(theta) - ln_gamma(theta + n) + ln_gamma(theta / d + t) - ln_gamma(theta / d)
                + t * (d.ln() - ln_gamma(1.0 - d))
                + table_sizes.map(|&s| ln_gamma(s as f64 - d)).sum::<f64>()
        }
    }

    /// Structural invariants: per-dish table sizes sum to the dish's
    /// customer count, dish counts sum to the total, and no empty tables or
    /// dishes linger.
    pub fn is_consistent(&self) -> bool {
        let mut customers = 0;
        let mut tables = 0;
        for (dish, group) in &self.tablegroups {
            if group.is_empty() || group.iter().any(|&s| s == 0) {
                return false;
            }
            if group.iter().sum::<usize>() != self.customers_for(*dish) {
                return false;
            }
            customers += group.iter().sum::<usize>();
            tables += group.len();
        }
        self.tablegroups.len() == self.ncustomers.len()
            && customers == self.total_customers
            && tables == self.ntables
    }
}

/// A Pitman-Yor process: seating state plus strength `theta >= 0`, discount
/// `0 <= d < 1` and an owned base distribution that new tables draw from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pyp {
    theta: f64,
    d: f64,
    crp: Crp,
    base: Base,
}

impl Pyp {
    pub fn new(theta: f64, d: f64, base: Base) -> Self {
        assert!(theta >= 0.0);
        assert!((0.0..1.0).contains(&d));
        Self {
            theta,
            d,
            crp: Crp::new(),
            base,
        }
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub(crate) fn crp(&self) -> &Crp {
        &self.crp
    }

    /// Partition likelihood of this node's seating only, excluding the base
    /// chain.
    pub fn seating_log_likelihood(&self) -> f64 {
        self.crp.log_likelihood(self.theta, self.d)
    }
}

impl Process for Pyp {
    fn increment<R: Rng>(&mut self, k: usize, rng: &mut R) {
        let base_log_prob = self.base.log_prob(k);
        if self.crp.increment(k, self.theta, self.d, base_log_prob, rng) {
            self.base.increment(k, rng);
        }
    }

    fn decrement<R: Rng>(&mut self, k: usize, rng: &mut R) {
        if self.crp.decrement(k, rng) {
            self.base.decrement(k, rng);
        }
    }

    fn log_prob(&self, k: usize) -> f64 {
        self.crp.log_prob(k, self.theta, self.d, self.base.log_prob(k))
    }

    fn log_likelihood(&self) -> f64 {
        self.seating_log_likelihood() + self.base.log_likelihood()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::Uniform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uniform_pyp(theta: f64, d: f64, k: usize) -> Pyp {
        Pyp::new(theta, d, Base::Uniform(Uniform::new(k)))
    }

    #[test]
    fn first_customer_of_a_dish_opens_a_table() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(1);
        let mut p = uniform_pyp(1.0, 0.0, 3);
        p.increment(0, &mut rng);
        assert_eq!(p.crp().num_customers(), 1);
        assert_eq!(p.crp().num_tables(), 1);
        assert_eq!(p.crp().customers_for(0), 1);
        assert!(p.crp().is_consistent());
        // theta = 1, d = 0, uniform 1/3 base: (1/3 + 1) / 2 and (1/3) / 2.
        assert!((p.log_prob(0) - (2.0f64 / 3.0).ln()).abs() < 1e-12);
        assert!((p.log_prob(1) - (1.0f64 / 6.0).ln()).abs() < 1e-12);
        assert!((p.log_prob(2) - (1.0f64 / 6.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn second_customer_shares_the_table_three_quarters_of_the_time() {
        // Existing table weighs 1, a new table (1 + 0) * 1/3, so the share
        // probability is 0.75.
        let mut shared = 0;
        let trials = 20_000;
        for seed in 0..trials {
            let mut rng: StdRng = SeedableRng::seed_from_u64(seed);
            let mut p = uniform_pyp(1.0, 0.0, 3);
            p.increment(0, &mut rng);
            p.increment(0, &mut rng);
            assert_eq!(p.crp().customers_for(0), 2);
            assert!(p.crp().is_consistent());
            if p.crp().tables_for(0) == 1 {
                shared += 1;
            }
        }
        let frac = shared as f64 / trials as f64;
        assert!(frac > 0.73 && frac < 0.77, "got {}", frac);
    }

    #[test]
    fn increment_decrement_round_trips_counts() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(5);
        let mut p = uniform_pyp(0.8, 0.5, 10);
        for &k in &[3, 3, 7, 3, 1, 7, 3, 9, 3] {
            p.increment(k, &mut rng);
        }
        let before = p.clone();
        p.increment(3, &mut rng);
        p.decrement(3, &mut rng);
        assert_eq!(p.crp().num_customers(), before.crp().num_customers());
        assert_eq!(p.crp().customers_for(3), before.crp().customers_for(3));
        assert!(p.crp().is_consistent());
    }

    #[test]
    fn full_unwind_restores_the_empty_state() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(6);
        let mut p = uniform_pyp(1.0, 0.3, 6);
        let dishes = [0, 5, 2, 2, 0, 1, 2, 5, 5, 5];
        for &k in &dishes {
            p.increment(k, &mut rng);
        }
        for &k in dishes.iter().rev() {
            p.decrement(k, &mut rng);
        }
        assert_eq!(p, uniform_pyp(1.0, 0.3, 6));
    }

    #[test]
    fn predictive_normalizes_over_finite_support() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(7);
        let mut p = uniform_pyp(0.5, 0.25, 5);
        for &k in &[0, 1, 1, 4, 1, 0, 2, 1, 1, 3, 3] {
            p.increment(k, &mut rng);
        }
        let total: f64 = (0..5).map(|k| p.log_prob(k).exp()).sum();
        assert!((total - 1.0).abs() < 1e-12, "got {}", total);
    }

    #[test]
    fn zero_discount_reduces_to_the_crp_formula() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(8);
        let theta = 1.5;
        let k_support = 4;
        let mut p = uniform_pyp(theta, 0.0, k_support);
        for &k in &[2, 2, 0, 2, 3, 0] {
            p.increment(k, &mut rng);
        }
        let n = p.crp().num_customers() as f64;
        for k in 0..k_support {
            let expected =
                (theta / k_support as f64 + p.crp().customers_for(k) as f64) / (theta + n);
            assert!((p.log_prob(k).exp() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn partition_likelihood_of_empty_seating_is_zero() {
        let p = uniform_pyp(1.0, 0.5, 3);
        assert!((p.seating_log_likelihood() - 0.0).abs() < 1e-12);
        assert!((uniform_pyp(1.0, 0.0, 3).seating_log_likelihood() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn partition_likelihood_of_one_customer_is_base_free() {
        // One customer at one table: the seating arrangement is certain, so
        // only the base contributes to the full likelihood.
        let mut rng: StdRng = SeedableRng::seed_from_u64(9);
        let mut p = uniform_pyp(2.0, 0.4, 3);
        p.increment(1, &mut rng);
        assert!(p.seating_log_likelihood().abs() < 1e-12);
        assert!((p.log_likelihood() - (1.0f64 / 3.0).ln()).abs() < 1e-12);
    }
}
