//! Synthetic sensor signal: a base value plus bounded uniform noise.

use panel_traits::NoiseSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::InjectorConfig;

/// Uniform noise backed by a `rand` generator.
#[derive(Debug, Clone)]
pub struct RandNoise<R> {
    rng: R,
}

impl RandNoise<StdRng> {
    /// Non-deterministic source seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandNoise<ChaCha8Rng> {
    /// Reproducible source; the same seed yields the same sample sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandNoise<R> {
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> NoiseSource for RandNoise<R> {
    fn uniform(&mut self, bound: f64) -> f64 {
        // gen_range panics on an empty or non-finite range
        if !(bound.is_finite() && bound > 0.0) {
            return 0.0;
        }
        self.rng.gen_range(-bound..=bound)
    }
}

/// Produces one raw sample per tick from the configured base value and noise bound.
#[derive(Debug)]
pub struct SignalGenerator<N> {
    noise: N,
}

impl<N: NoiseSource> SignalGenerator<N> {
    pub fn new(noise: N) -> Self {
        Self { noise }
    }

    /// `base_value + uniform(-noise_bound, +noise_bound)`.
    pub fn tick(&mut self, config: &InjectorConfig) -> f64 {
        config.base_value + self.noise.uniform(config.noise_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;

    fn cfg(base: f64, noise: f64) -> InjectorConfig {
        InjectorConfig {
            topic: "sensor/test".into(),
            base_value: base,
            noise_bound: noise,
            period_ms: 1000,
            filter: FilterKind::None,
        }
    }

    #[test]
    fn samples_stay_within_bound() {
        let mut generator = SignalGenerator::new(RandNoise::seeded(7));
        let c = cfg(74.0, 5.0);
        for _ in 0..1_000 {
            let raw = generator.tick(&c);
            assert!((69.0..=79.0).contains(&raw), "raw {raw} out of range");
        }
    }

    #[test]
    fn zero_bound_yields_base_value() {
        let mut generator = SignalGenerator::new(RandNoise::seeded(1));
        assert_eq!(generator.tick(&cfg(42.0, 0.0)), 42.0);
    }

    #[test]
    fn same_seed_same_sequence() {
        let c = cfg(10.0, 3.0);
        let mut a = SignalGenerator::new(RandNoise::seeded(99));
        let mut b = SignalGenerator::new(RandNoise::seeded(99));
        for _ in 0..20 {
            assert_eq!(a.tick(&c), b.tick(&c));
        }
    }
}
