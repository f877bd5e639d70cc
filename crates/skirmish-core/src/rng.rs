//! Deterministic dice roller
//!
//! Uses a simple xorshift64 algorithm for reproducibility across platforms.
//! The same seed produces the same sequence of rolls everywhere, which keeps
//! replays and tests deterministic.

use serde::{Deserialize, Serialize};

/// A deterministic dice RNG
///
/// Never use std::random or other non-deterministic sources for rule checks;
/// the roller state is serializable so a battle can be resumed mid-sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceRng {
    state: u64,
}

impl DiceRng {
    /// Create a new roller with the given seed
    pub fn new(seed: u64) -> Self {
        // Ensure non-zero state (xorshift requires this)
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Create a roller from a saved state
    pub fn from_state(state: u64) -> Self {
        let state = if state == 0 { 1 } else { state };
        Self { state }
    }

    /// Get the current state (useful for saving/loading)
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64 algorithm
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Roll a single six-sided die (1..=6)
    pub fn d6(&mut self) -> u8 {
        (self.next_u64() % 6) as u8 + 1
    }

    /// Roll a single three-sided die (1..=3), used for random command
    /// point methods
    pub fn d3(&mut self) -> u8 {
        (self.next_u64() % 3) as u8 + 1
    }
}

impl Default for DiceRng {
    fn default() -> Self {
        Self::new(12345)
    }
}
