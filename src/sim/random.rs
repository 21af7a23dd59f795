//! Injected randomness for zero-delta perturbation
//!
//! The force never touches a global generator. Tests pass a seeded PCG or
//! a fixed sequence so outcomes are reproducible.

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg32;

/// Source of uniform samples in `[0, 1)`
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: RngCore> RandomSource for R {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        Rng::random::<f64>(self)
    }
}

/// Adapter turning a closure into a random source
pub struct FnSource<F>(pub F);

impl<F: FnMut() -> f64> RandomSource for FnSource<F> {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        (self.0)()
    }
}

/// Deterministic PCG32 generator for a given seed
pub fn seeded(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

/// PCG32 generator seeded from the thread-local entropy source
pub fn from_entropy() -> Pcg32 {
    Pcg32::from_rng(&mut rand::rng())
}
