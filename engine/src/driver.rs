//! Async driver around [`RoundEngine`].
//!
//! The engine itself is single-threaded; the driver wraps it in a mutex
//! and runs the tick loop on a tokio interval, broadcasting every event
//! it produces. Commands (bets, cashouts, snapshots) go through
//! [`EngineHandle`] and take the same lock, so they serialize against
//! ticks and always observe a consistent phase.

use std::sync::{Arc, Mutex};

use jetstream_types::{BetId, EngineError, PlayerId, RoundEvent, RoundSnapshot};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::engine::{CashoutOutcome, RoundEngine};
use crate::ledger::BalanceLedger;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable command surface shared by the tick loop and connections.
pub struct EngineHandle<L: BalanceLedger, C: Clock> {
    engine: Arc<Mutex<RoundEngine<L>>>,
    events: broadcast::Sender<RoundEvent>,
    clock: Arc<C>,
}

impl<L: BalanceLedger, C: Clock> Clone for EngineHandle<L, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            events: self.events.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<L: BalanceLedger, C: Clock> EngineHandle<L, C> {
    pub fn place_bet(
        &self,
        player: PlayerId,
        slot: u8,
        amount: u64,
        auto_cashout: Option<u64>,
    ) -> Result<BetId, EngineError> {
        self.lock().place_bet(player, slot, amount, auto_cashout)
    }

    /// Cash out and broadcast any round-ending events the cashout
    /// produced, so subscribers see an early end exactly once.
    pub fn cashout(&self, player: &PlayerId, slot: u8) -> Result<CashoutOutcome, EngineError> {
        let now_ms = self.clock.now_ms();
        let outcome = self.lock().cashout(player, slot, now_ms)?;
        for event in &outcome.events {
            let _ = self.events.send(event.clone());
        }
        Ok(outcome)
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let now_ms = self.clock.now_ms();
        self.lock().snapshot(now_ms)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Run a closure against the ledger under the engine lock.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&mut L) -> T) -> T {
        f(self.lock().ledger_mut())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RoundEngine<L>> {
        match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Owns the engine and the tick task.
pub struct EngineDriver<L: BalanceLedger, C: Clock> {
    handle: EngineHandle<L, C>,
    tick_ms: u64,
}

impl<L: BalanceLedger + Send + 'static, C: Clock + 'static> EngineDriver<L, C> {
    pub fn new(engine: RoundEngine<L>, clock: C) -> Self {
        let tick_ms = engine.config().tick_ms;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handle: EngineHandle {
                engine: Arc::new(Mutex::new(engine)),
                events,
                clock: Arc::new(clock),
            },
            tick_ms,
        }
    }

    pub fn handle(&self) -> EngineHandle<L, C> {
        self.handle.clone()
    }

    /// Spawn the tick loop. Events are dropped when no subscriber is
    /// connected; lagging subscribers skip ahead on their receiver.
    pub fn spawn(&self) -> JoinHandle<()> {
        let handle = self.handle.clone();
        let tick_ms = self.tick_ms;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let now_ms = handle.clock.now_ms();
                let events = handle.lock().tick(now_ms);
                for event in events {
                    // Send fails only with no subscribers; nothing to do.
                    let _ = handle.events.send(event);
                }
            }
        })
    }
}
