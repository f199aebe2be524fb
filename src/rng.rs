//! Deterministic random number streams
//!
//! Every particle draws from its own ChaCha stream keyed by (master seed,
//! particle id), so a run replays bit-for-bit no matter which worker thread
//! a particle lands on.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type ParticleRng = ChaCha8Rng;

#[derive(Debug, Clone, Copy)]
pub struct RngStreams {
    master_seed: u64,
}

impl RngStreams {
    pub fn new(seed: u64) -> Self {
        Self {
            master_seed: derive_seed(seed),
        }
    }

    /// Independent stream for one particle.
    pub fn particle(&self, particle_id: u32) -> ParticleRng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.master_seed);
        rng.set_stream(u64::from(particle_id));
        rng
    }
}

impl Default for RngStreams {
    fn default() -> Self {
        Self::new(42)
    }
}

// Spread small user seeds (0, 1, 2...) across the whole key space.
fn derive_seed(seed: u64) -> u64 {
    let mut mixed = seed;
    mixed = mixed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    mixed ^= mixed >> 33;
    mixed = mixed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    mixed
}
