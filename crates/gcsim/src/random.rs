//! Deterministic pseudo-random generator
//!
//! A 31-bit linear congruential generator. Every engine owns its own instance
//! in the default state, so a run is reproducible for a given configuration
//! and thread count. Not suitable for anything security related.

const MULTIPLIER: u64 = 314_159_269;
const INCREMENT: u64 = 278_281;
const MODULUS_MASK: u64 = (1 << 31) - 1;

/// Linear congruential generator: `x = (314159269 * x + 278281) mod 2^31`
#[derive(Debug, Clone, Default)]
pub struct Rand {
    x: u64,
}

impl Rand {
    /// Create a generator in the default state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with an explicit starting state
    pub fn with_seed(seed: u32) -> Self {
        Self {
            x: u64::from(seed) & MODULUS_MASK,
        }
    }

    fn advance(&mut self) -> u64 {
        self.x = (MULTIPLIER.wrapping_mul(self.x).wrapping_add(INCREMENT)) & MODULUS_MASK;
        self.x
    }

    /// Next value in `[0, r)`; always 0 when `r` is 0
    pub fn get_rand(&mut self, r: u64) -> u64 {
        let x = self.advance();
        ((u128::from(x) * u128::from(r)) >> 31) as u64
    }

    /// Next value in `[low, high)`; `low` when the range is empty
    pub fn get_rand_range(&mut self, low: u64, high: u64) -> u64 {
        low + self.get_rand(high.saturating_sub(low))
    }

    /// Uniform index into a collection of `len` elements
    pub fn get_index(&mut self, len: usize) -> usize {
        self.get_rand(len as u64) as usize
    }
}
