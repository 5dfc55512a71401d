//! Seeded random source for the spawner

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Uniform float source used by the spawner
///
/// Deterministic for a given seed. Gameplay never depends on fairness, so the
/// default game seeds it from the clock.
#[derive(Debug, Clone)]
pub struct SpawnRng {
    seed: u64,
    rng: Pcg32,
}

impl SpawnRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Seed from the high-resolution system clock
    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self::new(nanos)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in `[min, max]`
    pub fn uniform(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Uniform float in `[min, max)`
    pub fn uniform_exclusive(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..max)
    }
}
