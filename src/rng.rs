use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};

/// Seedable random source injected into the mission at construction so that a
/// run is fully reproducible from its seed.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u64,
    inner: StdRng,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_f32(&mut self) -> f32 {
        self.inner.random::<f32>()
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.random::<u64>()
    }

    /// Inclusive on both ends.
    pub fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        self.inner.random_range(min..=max)
    }

    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        min + self.next_f32() * (max - min)
    }

    /// Probabilities outside [0, 1] are clamped before sampling.
    pub fn bool(&mut self, probability: f32) -> bool {
        let p = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.next_f32() < p
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.inner.random_range(0..len)
    }
}
