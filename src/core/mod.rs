//! Core primitives.
//!
//! The multiplier curve and the provably-fair crash point draw. Nothing in
//! here touches players, money or I/O.

pub mod curve;
pub mod rng;
pub mod crash_point;

// Re-export core types
pub use curve::multiplier_at;
pub use rng::{DeterministicRng, EntropySource, OsEntropy, RoundSeed};
pub use crash_point::{roll_from_seed, CrashPointGenerator, CrashRoll, CRASH_SALT, INSTANT_CRASH};
