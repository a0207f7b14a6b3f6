//! Deterministic RNG sub-stream derivation from a single master seed.
//!
//! A run is seeded once; MCTS rollouts, the arrival process, and measurement
//! noise each need their own independent stream so that, e.g., adding a
//! request to the arrival process does not perturb the MCTS exploration
//! sequence of an unrelated flow. Sub-streams are derived by hashing the
//! master seed together with a fixed per-purpose tag, following the same
//! `StdRng::seed_from_u64` convention the teacher uses for scenario
//! generation, just applied once per purpose instead of once per run.

use rand::rngs::StdRng;
use rand::SeedableRng;

const TAG_MCTS: u64 = 0x4d_43_54_53; // "MCTS"
const TAG_ARRIVALS: u64 = 0x41_52_52_56; // "ARRV"
const TAG_MEASUREMENT: u64 = 0x4d_45_41_53; // "MEAS"

fn derive_seed(master_seed: u64, tag: u64) -> u64 {
    // splitmix64-style finalizer, applied to (seed ^ tag), to decorrelate
    // sub-streams sharing the same master seed.
    let mut z = master_seed ^ tag.wrapping_mul(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// The three independent RNG streams a run needs, all deterministically
/// derived from one master seed.
pub struct RngStreams {
    pub mcts: StdRng,
    pub arrivals: StdRng,
    pub measurement: StdRng,
}

impl RngStreams {
    pub fn from_master_seed(master_seed: u64) -> Self {
        RngStreams {
            mcts: StdRng::seed_from_u64(derive_seed(master_seed, TAG_MCTS)),
            arrivals: StdRng::seed_from_u64(derive_seed(master_seed, TAG_ARRIVALS)),
            measurement: StdRng::seed_from_u64(derive_seed(master_seed, TAG_MEASUREMENT)),
        }
    }
}
