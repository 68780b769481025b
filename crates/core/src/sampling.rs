//! Distribution sampling over a seeded RNG.
//!
//! The protocol needs exponential inter-arrival times (transaction
//! generation, the mining race) and a Poisson draw (initial Value counts).
//! Sampling always goes through the caller's RNG so that a seeded run is
//! reproducible.

use rand::Rng;
use std::time::Duration;

/// Sample an exponentially distributed duration with the given mean.
pub fn exponential(rng: &mut impl Rng, mean: Duration) -> Duration {
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    let sample = -u.ln() * mean.as_secs_f64();
    // Guard the tail: a pathological draw must not outlive the simulation.
    Duration::from_secs_f64(sample.min(9_223_372.0))
}

/// Sample a Poisson-distributed count with the given mean (Knuth).
pub fn poisson(rng: &mut impl Rng, mean: f64) -> u64 {
    if mean <= 0.0 {
        return 0;
    }
    let limit = (-mean).exp();
    let mut k = 0u64;
    let mut p = 1.0f64;
    loop {
        p *= rng.gen_range(0.0..1.0);
        if p <= limit {
            return k;
        }
        k += 1;
    }
}

/// Sample a uniform duration from `[0, bound)`.
pub fn uniform_delay(rng: &mut impl Rng, bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rng.gen_range(0.0..bound.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_exponential_mean_roughly_correct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mean = Duration::from_secs(100);
        let n = 10_000;
        let total: f64 = (0..n)
            .map(|_| exponential(&mut rng, mean).as_secs_f64())
            .sum();
        let avg = total / n as f64;
        assert!((avg - 100.0).abs() < 5.0, "sample mean {avg} too far from 100");
    }

    #[test]
    fn test_poisson_mean_roughly_correct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let n = 10_000;
        let total: u64 = (0..n).map(|_| poisson(&mut rng, 8.0)).sum();
        let avg = total as f64 / n as f64;
        assert!((avg - 8.0).abs() < 0.2, "sample mean {avg} too far from 8");
    }

    #[test]
    fn test_uniform_delay_within_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let bound = Duration::from_secs(2);
        for _ in 0..1000 {
            assert!(uniform_delay(&mut rng, bound) < bound);
        }
    }

    #[test]
    fn test_sampling_deterministic_per_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(
                exponential(&mut a, Duration::from_secs(10)),
                exponential(&mut b, Duration::from_secs(10))
            );
        }
    }
}
