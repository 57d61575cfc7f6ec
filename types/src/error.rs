//! Error taxonomy for engine commands.
//!
//! Every variant is surfaced synchronously to the command issuer; the
//! engine never retries on its own.

use thiserror::Error;

use crate::round::RoundPhase;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Command issued in the wrong round phase.
    #[error("command not allowed while round is {}", phase.as_str())]
    InvalidPhase { phase: RoundPhase },
    #[error("bet amount must be greater than zero")]
    InvalidAmount,
    #[error("auto cashout threshold must exceed 1.00x")]
    InvalidThreshold,
    #[error("slot {slot} out of range (1..={max})")]
    InvalidSlot { slot: u8, max: u8 },
    /// Reported by the ledger; no bet is created.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Stale or duplicate cashout.
    #[error("no pending bet for this player and slot")]
    NoSuchBet,
    /// External ledger failure; the command fails closed.
    #[error("balance ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("invalid engine config: {0}")]
    InvalidConfig(&'static str),
    /// A crash-point policy returning a value <= 1.00x is a fatal
    /// configuration error, caught at engine construction.
    #[error("crash point policy returned {value} for round {index} (must exceed 1.00x)")]
    InvalidCrashPoint { index: u64, value: u64 },
}

impl EngineError {
    /// Stable machine-readable code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidPhase { .. } => "INVALID_PHASE",
            EngineError::InvalidAmount => "INVALID_AMOUNT",
            EngineError::InvalidThreshold => "INVALID_THRESHOLD",
            EngineError::InvalidSlot { .. } => "INVALID_SLOT",
            EngineError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            EngineError::NoSuchBet => "NO_SUCH_BET",
            EngineError::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            EngineError::InvalidConfig(_) => "INVALID_CONFIG",
            EngineError::InvalidCrashPoint { .. } => "INVALID_CRASH_POINT",
        }
    }
}
