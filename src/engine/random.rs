//! Deterministic per-cell pseudo-random number generation.
//!
//! Behavior modules draw random numbers while cells are processed on an
//! arbitrary number of worker threads. A thread-local or shared generator
//! would make the result depend on which worker handled which cell, so every
//! cell gets its own short-lived stream instead.
//!
//! # Design
//!
//! - The stream for one cell in one step is seeded from
//!   `(run seed, step, agent type, cell index)` through a splitmix64 mix.
//! - The generator itself is **xorshift64\***: one `u64` of state, no heap,
//!   no synchronization.
//! - [`CellRng`] implements [`rand::RngCore`], so modules draw through the
//!   `rand::Rng` helpers (`gen`, `gen_range`).
//!
//! # Determinism
//!
//! Identical seeds yield identical sequences on every thread. The random
//! draws a cell sees therefore depend only on the run seed, the step and the
//! cell's position in its container.
//!
//! # Non-goals
//!
//! This generator is **not cryptographically secure**.

use rand::{Rng, RngCore};

use crate::engine::types::{AgentType, CellIndex, Step};


const FALLBACK_STATE: u64 = 0x9E37_79B9_7F4A_7C15;

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Small, fast, seedable xorshift64\* generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellRng {
    state: u64,
}

impl CellRng {
    /// Creates a generator from a raw seed.
    pub fn from_seed_u64(seed: u64) -> Self {
        let state = splitmix64(seed);
        Self { state: if state == 0 { FALLBACK_STATE } else { state } }
    }

    /// Creates the stream used by one cell during one step.
    pub fn for_cell(seed: u64, step: Step, agent_type: AgentType, index: CellIndex) -> Self {
        let mut h = splitmix64(seed);
        h = splitmix64(h ^ step);
        h = splitmix64(h ^ ((agent_type.0 as u64) << 32 | index as u64));
        Self::from_seed_u64(h)
    }

    /// Returns a uniform `f64` in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.gen()
    }
}

impl RngCore for CellRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
