//! Crash-point selection policies.
//!
//! A policy is a pure function of the round index so rounds can be
//! replayed and policies swapped without touching engine state. The
//! engine probes every policy at construction and refuses to start if a
//! probe returns a value at or below 1.00x.

use jetstream_types::MULTIPLIER_ONE;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub trait CrashPointPolicy: Send + Sync {
    /// Crash multiplier for a round, in hundredths. Must exceed 1.00x
    /// and must depend only on `round_index`.
    fn crash_point(&self, round_index: u64) -> u64;
}

/// Rounds per full table cycle.
const TABLE_PERIOD: u64 = 50;
/// Crash point per block of ten rounds: 20x, 60x, 200x, 600x, 1000x.
const TABLE_POINTS: [u64; 5] = [2_000, 6_000, 20_000, 60_000, 100_000];

/// The legacy deterministic table: round indices wrap into 1..=50 and
/// each block of ten rounds shares a crash point.
#[derive(Clone, Copy, Debug, Default)]
pub struct BucketedTable;

impl CrashPointPolicy for BucketedTable {
    fn crash_point(&self, round_index: u64) -> u64 {
        let wrapped = if round_index == 0 {
            1
        } else {
            (round_index - 1) % TABLE_PERIOD + 1
        };
        let bucket = ((wrapped - 1) / 10) as usize;
        TABLE_POINTS[bucket.min(TABLE_POINTS.len() - 1)]
    }
}

/// Smallest crash point a fair draw may produce (1.01x); the invariant
/// is crash_point > 1.00x.
const MIN_CRASH_POINT: u64 = MULTIPLIER_ONE + 1;
/// Largest crash point a fair draw may produce (100.00x).
const MAX_CRASH_POINT: u64 = 10_000;

/// Seeded crash-point generator with a configurable house edge.
///
/// Each round derives its own rng from (seed, round index) and maps a
/// uniform draw through the inverse CDF of the crash distribution in
/// fixed point: `point = (10000 - edge_bps) * 100 / (10000 - u)` with
/// `u` uniform in 0..=9900. Publishing the seed after the fact lets
/// players verify every round.
#[derive(Clone, Copy, Debug)]
pub struct ProvablyFair {
    seed: u64,
    house_edge_bps: u16,
}

impl ProvablyFair {
    pub fn new(seed: u64, house_edge_bps: u16) -> Self {
        Self {
            seed,
            house_edge_bps: house_edge_bps.min(9_999),
        }
    }
}

impl CrashPointPolicy for ProvablyFair {
    fn crash_point(&self, round_index: u64) -> u64 {
        let stream = self.seed ^ round_index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = ChaCha8Rng::seed_from_u64(stream);
        let raw: u32 = rng.gen();

        let normalized = (raw as u128 * 9_900) / (u32::MAX as u128); // 0..=9900
        let denominator = 10_000u128 - normalized; // 100..=10000
        let edge_factor = 10_000u128 - self.house_edge_bps as u128;
        let point = (edge_factor * 100) / denominator;
        (point as u64).clamp(MIN_CRASH_POINT, MAX_CRASH_POINT)
    }
}
