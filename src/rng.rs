//! Seeded batch random number generator (spec.md §4.1).
//!
//! Every distribution method draws from a pre-generated batch keyed by its
//! rounded parameters, refilling the batch from the underlying seeded RNG
//! when exhausted. Two calls asking for "the same" distribution (identical
//! parameters, once rounded) share a batch and therefore share the same
//! draw sequence position -- this is what the Python original's
//! `RandomBatchGenerator` does, and it is what makes a run reproducible
//! independent of incidental call-site ordering differences between
//! refactors.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;
use std::collections::HashMap;

/// Number of values drawn per batch refill.
const BATCH_SIZE: usize = 1024;

/// Decimal places parameters are rounded to before being used as a batch key.
/// Two requests whose parameters agree to this precision are considered
/// "the same" distribution and share a batch.
const PARAM_PRECISION: i32 = 6;

fn round_param(x: f64) -> u64 {
    let scale = 10f64.powi(PARAM_PRECISION);
    (x * scale).round() as i64 as u64
}

#[derive(Default)]
struct Batch {
    values: Vec<f64>,
    cursor: usize,
}

/// Seeded, reproducible, batched source of all the distributions the
/// simulation needs. One instance is shared (via `Rc<RefCell<_>>`) across an
/// entire run.
pub struct RandomSource {
    rng: ChaCha8Rng,
    exponential_batches: HashMap<u64, Batch>,
    normal_batches: HashMap<(u64, u64, u64), Batch>,
    lognormal_batches: HashMap<(u64, u64), Batch>,
    hyperexp_batches: HashMap<(u64, u64, u64), Batch>,
    uniform01_batch: Batch,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        RandomSource {
            rng: ChaCha8Rng::seed_from_u64(seed),
            exponential_batches: HashMap::new(),
            normal_batches: HashMap::new(),
            lognormal_batches: HashMap::new(),
            hyperexp_batches: HashMap::new(),
            uniform01_batch: Batch::default(),
        }
    }

    fn next_uniform01(&mut self) -> f64 {
        let batch = &mut self.uniform01_batch;
        if batch.cursor >= batch.values.len() {
            batch.values = (0..BATCH_SIZE).map(|_| self.rng.gen::<f64>()).collect();
            batch.cursor = 0;
        }
        let v = batch.values[batch.cursor];
        batch.cursor += 1;
        v
    }

    /// Uniform sample in `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        self.next_uniform01()
    }

    /// `Exponential(mean)` via inverse-CDF sampling from the shared uniform
    /// batch, itself batched per rounded `mean`.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        let key = round_param(mean);
        if !self.exponential_batches.contains_key(&key) {
            self.exponential_batches.insert(key, Batch::default());
        }
        let needs_refill = {
            let batch = self.exponential_batches.get(&key).unwrap();
            batch.cursor >= batch.values.len()
        };
        if needs_refill {
            let values: Vec<f64> = (0..BATCH_SIZE)
                .map(|_| {
                    let u = self.next_uniform01().max(f64::EPSILON);
                    -mean * u.ln()
                })
                .collect();
            let batch = self.exponential_batches.get_mut(&key).unwrap();
            batch.values = values;
            batch.cursor = 0;
        }
        let batch = self.exponential_batches.get_mut(&key).unwrap();
        let v = batch.values[batch.cursor];
        batch.cursor += 1;
        v
    }

    /// `Normal(mean, stddev)`, resampled below `min_cap` (spec.md §4.1).
    pub fn normal(&mut self, mean: f64, stddev: f64, min_cap: f64) -> f64 {
        let key = (round_param(mean), round_param(stddev), round_param(min_cap));
        loop {
            if !self.normal_batches.contains_key(&key) {
                self.normal_batches.insert(key, Batch::default());
            }
            let needs_refill = {
                let batch = self.normal_batches.get(&key).unwrap();
                batch.cursor >= batch.values.len()
            };
            if needs_refill {
                let values: Vec<f64> = (0..BATCH_SIZE)
                    .map(|_| {
                        let (u1, u2) = (
                            self.next_uniform01().max(f64::EPSILON),
                            self.next_uniform01(),
                        );
                        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                        mean + stddev * z
                    })
                    .collect();
                let batch = self.normal_batches.get_mut(&key).unwrap();
                batch.values = values;
                batch.cursor = 0;
            }
            let batch = self.normal_batches.get_mut(&key).unwrap();
            let v = batch.values[batch.cursor];
            batch.cursor += 1;
            if v >= min_cap {
                return v;
            }
            // resample below min_cap, as specified
        }
    }

    /// `Lognormal(mean, sigma)` in the underlying-normal parameterization.
    pub fn lognormal(&mut self, mean: f64, sigma: f64) -> f64 {
        let key = (round_param(mean), round_param(sigma));
        if !self.lognormal_batches.contains_key(&key) {
            self.lognormal_batches.insert(key, Batch::default());
        }
        let needs_refill = {
            let batch = self.lognormal_batches.get(&key).unwrap();
            batch.cursor >= batch.values.len()
        };
        if needs_refill {
            let values: Vec<f64> = (0..BATCH_SIZE)
                .map(|_| {
                    let (u1, u2) = (
                        self.next_uniform01().max(f64::EPSILON),
                        self.next_uniform01(),
                    );
                    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                    (mean + sigma * z).exp()
                })
                .collect();
            let batch = self.lognormal_batches.get_mut(&key).unwrap();
            batch.values = values;
            batch.cursor = 0;
        }
        let batch = self.lognormal_batches.get_mut(&key).unwrap();
        let v = batch.values[batch.cursor];
        batch.cursor += 1;
        v
    }

    /// Two-stage hyperexponential mixture: with probability `p` draw from
    /// `Exponential(1/lambda1)`, otherwise from `Exponential(1/lambda2)`.
    pub fn hyperexponential2(&mut self, lambda1: f64, lambda2: f64, p: f64) -> f64 {
        let key = (round_param(lambda1), round_param(lambda2), round_param(p));
        let choose_first = {
            // Mixing decision shares the uniform01 batch; the exponential
            // draw itself is keyed per-branch so each branch gets its own
            // batch (matching "callers asking for the same distribution
            // share a batch").
            let _ = key;
            self.next_uniform01() < p
        };
        if choose_first {
            self.exponential(1.0 / lambda1)
        } else {
            self.exponential(1.0 / lambda2)
        }
    }

    /// Zipf-distributed integer in `[0, n)` with skew `alpha`, via rejection
    /// sampling against the zeta distribution (the same technique
    /// `rand_distr::Zipf` uses internally; reimplemented locally to avoid
    /// pulling in a whole distribution crate for a single sampler).
    pub fn zipf(&mut self, alpha: f64, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let nf = n as f64;
        let t = (-alpha * (1.5f64).ln()).exp() + nf;
        loop {
            let u = self.next_uniform01();
            let v = self.next_uniform01();
            let x = (t * u).floor();
            let rank = if x < 1.0 { 1.0 } else { x };
            if rank >= nf {
                continue;
            }
            let t_inv = rank.powf(-alpha);
            let bound_lo = (rank - 1.0).max(1.0).powf(-alpha - 1.0);
            if v * (rank + 1.0).ln_1p() <= t_inv / bound_lo.max(f64::EPSILON) {
                return (rank as usize).saturating_sub(1).min(n - 1);
            }
        }
    }

    /// Uniform integer in `[0, n)`.
    pub fn uniform_in_range(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_uniform01() * n as f64) as usize % n
    }

    /// Pick a uniformly random element from a non-empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.uniform_in_range(items.len()))
    }

    /// Fisher-Yates shuffle, in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.uniform_in_range(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_given_seed() {
        let mut a = RandomSource::new(42);
        let mut b = RandomSource::new(42);
        for _ in 0..50 {
            assert_eq!(a.exponential(1.0), b.exponential(1.0));
        }
    }

    #[test]
    fn normal_respects_min_cap() {
        let mut rng = RandomSource::new(7);
        for _ in 0..500 {
            let v = rng.normal(1.0, 5.0, 0.5);
            assert!(v >= 0.5);
        }
    }

    #[test]
    fn uniform_in_range_is_bounded() {
        let mut rng = RandomSource::new(3);
        for _ in 0..200 {
            assert!(rng.uniform_in_range(10) < 10);
        }
    }

    #[test]
    fn shuffle_preserves_elements() {
        let mut rng = RandomSource::new(9);
        let mut xs: Vec<i32> = (0..20).collect();
        let original = xs.clone();
        rng.shuffle(&mut xs);
        let mut sorted = xs.clone();
        sorted.sort();
        assert_eq!(sorted, original);
    }
}
