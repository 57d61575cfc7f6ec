//! Crash-game round engine.
//!
//! The core is a sans-IO state machine ([`engine::RoundEngine`]) driven
//! by millisecond timestamps, which makes every timing property testable
//! without wall-clock waits. The async layer ([`driver::EngineDriver`])
//! owns the tick loop and serializes commands against ticks through a
//! mutex, so a command never observes a half-applied tick.
//!
//! Rounds cycle waiting -> flying -> crashed indefinitely. The crash
//! point for each round comes from a pluggable [`policy::CrashPointPolicy`];
//! multiplier progression from a pluggable [`curve::MultiplierCurve`].
//! Player balances live behind the external [`ledger::BalanceLedger`]
//! collaborator; the engine never keeps its own copy.

pub mod book;
pub mod clock;
pub mod curve;
pub mod driver;
pub mod engine;
pub mod ledger;
pub mod policy;

pub use book::BetBook;
pub use clock::{Clock, ManualClock, SystemClock};
pub use curve::{GeometricCurve, MultiplierCurve};
pub use driver::{EngineDriver, EngineHandle};
pub use engine::{CashoutOutcome, RoundEngine};
pub use ledger::{BalanceLedger, InMemoryLedger, LedgerError};
pub use policy::{BucketedTable, CrashPointPolicy, ProvablyFair};
