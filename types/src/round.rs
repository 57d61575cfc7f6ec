//! Round lifecycle types.
//!
//! A round cycles waiting -> flying -> crashed forever. The `Round`
//! record exists only between flight start and settlement; the waiting
//! countdown runs between rounds.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Phase of the current round cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// Countdown before flight; bets may be placed or replaced.
    Waiting,
    /// Multiplier climbing; bets may be cashed out.
    Flying,
    /// Crash point reached; settlement delay before the next countdown.
    Crashed,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Flying => "flying",
            RoundPhase::Crashed => "crashed",
        }
    }
}

/// One flight, created when the countdown completes. The crash point is
/// fixed at creation and never recalculated mid-flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub index: u64,
    pub crash_point: u64,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
}

/// Point-in-time view of the engine for presentation. The crash point
/// is revealed only once the round has crashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub round_index: u64,
    pub phase: RoundPhase,
    pub multiplier: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub countdown_remaining_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub crash_point: Option<u64>,
    pub history: Vec<u64>,
}

/// Bounded ring of past crash points, most recent first. Display-only
/// derived data, never authoritative state.
#[derive(Clone, Debug, Default)]
pub struct RoundHistory {
    points: VecDeque<u64>,
    capacity: usize,
}

impl RoundHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, crash_point: u64) {
        self.points.push_front(crash_point);
        self.points.truncate(self.capacity);
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
