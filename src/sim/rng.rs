//! Deterministic failure source
//!
//! A single seeded `Pcg32` decides every probabilistic outcome in a cycle.
//! Draw order is fixed: one draw per non-trivial move (injected collision),
//! one per grasp attempt (missed pick), one per release attempt (failed
//! release). Replaying the same seed against the same operations reproduces
//! the same outcomes.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// PCG stream used for generating object properties, kept apart from the
/// failure sequence so layout generation never shifts failure draws
pub const LAYOUT_STREAM: u64 = 0x5eed_0b1e;

/// What a draw is being used to decide (for tracing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draw {
    Collision,
    Grasp,
    Release,
}

/// Seeded pseudo-random failure generator
#[derive(Debug, Clone)]
pub struct FailureSource {
    seed: u64,
    rng: Pcg32,
    draws: u64,
}

impl FailureSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            draws: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values consumed since the last reseed
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Draw once; true means the failure happens.
    ///
    /// Always consumes exactly one value, whatever the probability.
    pub fn roll(&mut self, what: Draw, probability: f64) -> bool {
        let value: f64 = self.rng.random();
        self.draws += 1;
        let failed = value < probability;
        log::trace!(
            "draw #{} {:?}: {:.4} vs p={} -> {}",
            self.draws,
            what,
            value,
            probability,
            if failed { "fail" } else { "ok" }
        );
        failed
    }

    /// Restart the sequence from the original seed (between cycles only)
    pub fn reseed(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.draws = 0;
    }

    /// Independent generator for object property generation
    pub fn layout_rng(seed: u64) -> Pcg32 {
        Pcg32::new(seed, LAYOUT_STREAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = FailureSource::new(42);
        let mut b = FailureSource::new(42);
        for _ in 0..100 {
            assert_eq!(a.roll(Draw::Grasp, 0.5), b.roll(Draw::Grasp, 0.5));
        }
        assert_eq!(a.draws(), 100);
    }

    #[test]
    fn test_extreme_probabilities() {
        let mut source = FailureSource::new(7);
        for _ in 0..200 {
            assert!(source.roll(Draw::Grasp, 1.0));
            assert!(!source.roll(Draw::Release, 0.0));
        }
    }

    #[test]
    fn test_reseed_replays() {
        let mut source = FailureSource::new(99);
        let first: Vec<bool> = (0..32).map(|_| source.roll(Draw::Collision, 0.3)).collect();
        source.reseed();
        assert_eq!(source.draws(), 0);
        let second: Vec<bool> = (0..32).map(|_| source.roll(Draw::Collision, 0.3)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rate_tracks_probability() {
        let mut source = FailureSource::new(1234);
        let hits = (0..10_000)
            .filter(|_| source.roll(Draw::Grasp, 0.25))
            .count();
        let rate = hits as f64 / 10_000.0;
        assert!((rate - 0.25).abs() < 0.03, "rate {rate}");
    }
}
