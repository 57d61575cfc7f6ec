//! Common types shared across the jetstream crates: the round/bet data
//! model, engine configuration, the error taxonomy, and the wire-level
//! command/event messages.

pub mod api;
pub mod bet;
pub mod config;
pub mod error;
pub mod round;

pub use api::{CashoutReceipt, Inbound, Outbound, RoundEvent};
pub use bet::{Bet, BetStatus};
pub use config::EngineConfig;
pub use error::EngineError;
pub use round::{Round, RoundHistory, RoundPhase, RoundSnapshot};

/// Player identifier as presented by the transport layer.
pub type PlayerId = String;

/// Bet identifier, unique within one engine instance.
pub type BetId = u64;

/// Multipliers are fixed-point hundredths: 100 = 1.00x, 205 = 2.05x.
pub const MULTIPLIER_ONE: u64 = 100;

/// Render a hundredths multiplier for display, e.g. 205 -> "2.05x".
pub fn format_multiplier(value: u64) -> String {
    format!("{}.{:02}x", value / MULTIPLIER_ONE, value % MULTIPLIER_ONE)
}
