//! Token sampling from a probability row.

use rand::{Error, RngCore, SeedableRng};

use crate::TokenId;

/// The 64-bit xorshift* generator used for reproducible sampling.
///
/// One 32-bit output is the high half of the scrambled state after the
/// `(12, 25, 27)` shift triple. The seed is the raw generator state, so a
/// run is reproducible from the single integer given on the command
/// line.
#[derive(Debug, Clone)]
pub struct XorShiftRng {
    state: u64,
}

impl RngCore for XorShiftRng {
    fn next_u32(&mut self) -> u32 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        (self.state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShiftRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u64::from_le_bytes(seed),
        }
    }

    // The default implementation scrambles the value; here the seed IS
    // the state.
    fn seed_from_u64(state: u64) -> Self {
        Self { state }
    }
}

/// Draws a uniform float in `[0, 1)` with 24 bits of precision.
fn coin(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() >> 8) as f32 / 16_777_216.0
}

/// Turns the last position's probability row into a token id.
pub trait Sampler {
    /// Samples a token id from a probability row.
    ///
    /// Consults the generator exactly once.
    fn sample(&self, probs: &[f32], rng: &mut dyn RngCore) -> TokenId;
}

/// Inverse-CDF multinomial sampling.
///
/// Walks the row accumulating probability mass until the drawn coin is
/// covered. If rounding leaves the total mass short of the coin, the
/// last id wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct Multinomial;

impl Sampler for Multinomial {
    fn sample(&self, probs: &[f32], rng: &mut dyn RngCore) -> TokenId {
        let u = coin(rng);
        let mut cdf = 0.0f32;
        for (i, &p) in probs.iter().enumerate() {
            cdf += p;
            if u < cdf {
                return i as TokenId;
            }
        }
        probs.len() as TokenId - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_the_raw_state() {
        let mut a = XorShiftRng::seed_from_u64(1337);
        let mut b = XorShiftRng::from_seed(1337u64.to_le_bytes());
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn coins_are_unit_interval() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let u = coin(&mut rng);
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn sampling_is_deterministic() {
        let probs = [0.1f32, 0.2, 0.3, 0.4];
        let draw = |seed| {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            (0..64)
                .map(|_| Multinomial.sample(&probs, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(1337), draw(1337));
        assert!(draw(1337).iter().all(|&id| id < 4));
    }

    #[test]
    fn sampling_matches_the_distribution() {
        // fraction of zeros over 100k draws must land within 5 sigma of p
        let p = 0.3f32;
        let mut probs = vec![0.0f32; 16];
        probs[0] = p;
        probs[1] = 1.0 - p;

        let mut rng = XorShiftRng::seed_from_u64(1337);
        let n = 100_000;
        let zeros = (0..n)
            .filter(|_| Multinomial.sample(&probs, &mut rng) == 0)
            .count();
        let fraction = zeros as f64 / n as f64;
        let sigma = (0.3f64 * 0.7 / n as f64).sqrt();
        assert!(
            (fraction - 0.3).abs() < 5.0 * sigma,
            "fraction {fraction} too far from 0.3"
        );
    }

    #[test]
    fn exhausted_row_falls_back_to_the_last_id() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let probs = [0.0f32; 8];
        for _ in 0..32 {
            assert_eq!(Multinomial.sample(&probs, &mut rng), 7);
        }
    }
}
