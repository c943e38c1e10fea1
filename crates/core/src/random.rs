//! Injected randomness for layer assignment.
//!
//! The graph never owns a global generator: callers hand in a [`RandomSource`],
//! so a fixed seed reproduces the exact same layer assignment (and therefore
//! the exact same graph) on every run.

use crate::config;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform floats strictly inside `(0, 1)`.
pub trait RandomSource {
    /// Next uniform value in the open interval `(0, 1)`.
    fn next_f32(&mut self) -> f32;
}

/// Seeded [`StdRng`]-backed source. Zero draws are rejected.
#[derive(Debug, Clone)]
pub struct DefaultRandom {
    rng: StdRng,
}

impl DefaultRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for DefaultRandom {
    fn default() -> Self {
        Self::new(config::DEFAULT_RANDOM_SEED)
    }
}

impl RandomSource for DefaultRandom {
    fn next_f32(&mut self) -> f32 {
        loop {
            let u: f32 = self.rng.gen();
            if u > 0.0 {
                return u;
            }
        }
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f32(&mut self) -> f32 {
        (**self).next_f32()
    }
}

/// Draw a node layer: `floor(-ln(u) * lambda)` with `u` from `source`.
///
/// With `lambda = 1 / ln(M)` each layer holds roughly `1/M` of the nodes of the
/// layer below it.
pub fn random_layer<R: RandomSource + ?Sized>(source: &mut R, lambda: f64) -> usize {
    let u = source.next_f32() as f64;
    (-u.ln() * lambda).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl RandomSource for Fixed {
        fn next_f32(&mut self) -> f32 {
            self.0.remove(0)
        }
    }

    #[test]
    fn test_random_layer_formula() {
        let lambda = 1.0 / 10f64.ln();
        let mut src = Fixed(vec![0.5, 0.05, 0.0009, 0.99]);
        assert_eq!(random_layer(&mut src, lambda), 0);
        // -ln(0.05) / ln(10) ≈ 1.30
        assert_eq!(random_layer(&mut src, lambda), 1);
        // -ln(0.0009) / ln(10) ≈ 3.05
        assert_eq!(random_layer(&mut src, lambda), 3);
        assert_eq!(random_layer(&mut src, lambda), 0);
    }

    #[test]
    fn test_default_random_is_reproducible() {
        let mut a = DefaultRandom::new(7);
        let mut b = DefaultRandom::new(7);
        for _ in 0..100 {
            let (x, y) = (a.next_f32(), b.next_f32());
            assert_eq!(x.to_bits(), y.to_bits());
            assert!(x > 0.0 && x < 1.0);
        }
    }

    #[test]
    fn test_layer_distribution_thins_out() {
        let mut rng = DefaultRandom::default();
        let lambda = 1.0 / 10f64.ln();
        let layers: Vec<usize> = (0..10_000).map(|_| random_layer(&mut rng, lambda)).collect();
        let base = layers.iter().filter(|&&l| l == 0).count();
        let above = layers.iter().filter(|&&l| l >= 1).count();
        // Expected split is 90% / 10%
        assert!(base > 8_500, "layer 0 count {base}");
        assert!(above > 700 && above < 1_300, "layer >= 1 count {above}");
    }
}
