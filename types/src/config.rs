//! Engine configuration.

/// Timing and policy knobs for the round engine. Durations are
/// milliseconds; defaults match the original table (30s countdown,
/// 100ms tick, 3s settlement, two bet slots, last ten crash points).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Duration of the waiting countdown before each flight.
    pub countdown_ms: u64,
    /// Cadence at which the driver ticks the engine during flight.
    pub tick_ms: u64,
    /// Settlement delay between the crash and the next countdown.
    pub settle_ms: u64,
    /// Concurrent bet slots per player (slots are numbered 1..=N).
    pub slots_per_player: u8,
    /// Capacity of the crash-point history ring.
    pub history_capacity: usize,
    /// End the flight as soon as every placed bet has cashed out,
    /// without waiting for the crash point to be reached.
    pub end_round_when_all_cashed_out: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_ms: 30_000,
            tick_ms: 100,
            settle_ms: 3_000,
            slots_per_player: 2,
            history_capacity: 10,
            end_round_when_all_cashed_out: false,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration (durations and counts must be > 0).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.countdown_ms == 0 {
            return Err("countdown_ms must be greater than zero");
        }
        if self.tick_ms == 0 {
            return Err("tick_ms must be greater than zero");
        }
        if self.settle_ms == 0 {
            return Err("settle_ms must be greater than zero");
        }
        if self.slots_per_player == 0 {
            return Err("slots_per_player must be greater than zero");
        }
        if self.history_capacity == 0 {
            return Err("history_capacity must be greater than zero");
        }
        Ok(())
    }
}
