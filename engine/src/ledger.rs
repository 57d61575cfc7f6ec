//! The external balance ledger collaborator.
//!
//! Player balances are owned outside the engine. A ledger call either
//! fully succeeds or fully fails; the engine never assumes it can roll
//! one back, which is why debits happen before bet records are created
//! and credits after bets are marked cashed out.

use std::collections::HashMap;

use jetstream_types::{EngineError, PlayerId};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds => EngineError::InsufficientFunds,
            LedgerError::Unavailable(reason) => EngineError::LedgerUnavailable(reason),
        }
    }
}

pub trait BalanceLedger: Send {
    fn debit(&mut self, player: &PlayerId, amount: u64) -> Result<(), LedgerError>;
    fn credit(&mut self, player: &PlayerId, amount: u64) -> Result<(), LedgerError>;
}

/// Map-backed ledger for tests and the demo service.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    balances: HashMap<PlayerId, u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, player: &PlayerId, amount: u64) {
        let balance = self.balances.entry(player.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, player: &PlayerId) -> u64 {
        self.balances.get(player).copied().unwrap_or(0)
    }
}

impl BalanceLedger for InMemoryLedger {
    fn debit(&mut self, player: &PlayerId, amount: u64) -> Result<(), LedgerError> {
        let balance = self.balances.entry(player.clone()).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, player: &PlayerId, amount: u64) -> Result<(), LedgerError> {
        let balance = self.balances.entry(player.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(())
    }
}
