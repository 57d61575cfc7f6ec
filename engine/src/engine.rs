//! The round engine state machine.
//!
//! Rounds cycle waiting -> flying -> crashed indefinitely:
//!
//! - **Waiting**: countdown before flight; `place_bet` is allowed and a
//!   pending bet in the same slot is refunded and replaced.
//! - **Flying**: each tick advances the multiplier through the curve,
//!   clamped to the crash point. Auto cashouts settle at their
//!   threshold value, strictly before the crash check, so a threshold
//!   equal to the crash point pays out.
//! - **Crashed**: remaining pending bets are marked lost and the crash
//!   point joins the history; after the settlement delay the book is
//!   cleared and the next countdown begins.
//!
//! The engine is sans-IO: every time-dependent entry point takes a
//! millisecond timestamp, so tests drive it with virtual time. The
//! caller (see [`crate::driver`]) is responsible for serializing
//! commands against ticks.

use jetstream_types::{
    Bet, BetId, CashoutReceipt, EngineConfig, EngineError, PlayerId, Round, RoundEvent,
    RoundHistory, RoundPhase, RoundSnapshot, MULTIPLIER_ONE,
};
use tracing::{debug, error, info};

use crate::book::BetBook;
use crate::curve::MultiplierCurve;
use crate::ledger::BalanceLedger;
use crate::policy::CrashPointPolicy;

/// Round indices probed against the crash-point policy at construction.
/// Covers a full period of the bucketed table.
const POLICY_PROBE_ROUNDS: u64 = 64;

/// Result of a manual cashout. `events` is non-empty only when the
/// cashout ended the round early (all bets cashed out).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CashoutOutcome {
    pub receipt: CashoutReceipt,
    pub events: Vec<RoundEvent>,
}

pub struct RoundEngine<L: BalanceLedger> {
    config: EngineConfig,
    policy: Box<dyn CrashPointPolicy>,
    curve: Box<dyn MultiplierCurve>,
    ledger: L,
    book: BetBook,
    phase: RoundPhase,
    round_index: u64,
    current: Option<Round>,
    multiplier: u64,
    elapsed_ticks: u64,
    phase_ends_at_ms: u64,
    history: RoundHistory,
}

impl<L: BalanceLedger> RoundEngine<L> {
    /// Build an engine and start the first countdown at `start_ms`.
    ///
    /// Fails if the config is invalid or the policy yields a crash
    /// point at or below 1.00x for any probed round index.
    pub fn new(
        config: EngineConfig,
        policy: Box<dyn CrashPointPolicy>,
        curve: Box<dyn MultiplierCurve>,
        ledger: L,
        start_ms: u64,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        for index in 1..=POLICY_PROBE_ROUNDS {
            let value = policy.crash_point(index);
            if value <= MULTIPLIER_ONE {
                return Err(EngineError::InvalidCrashPoint { index, value });
            }
        }
        Ok(Self {
            phase_ends_at_ms: start_ms.saturating_add(config.countdown_ms),
            history: RoundHistory::new(config.history_capacity),
            config,
            policy,
            curve,
            ledger,
            book: BetBook::new(),
            phase: RoundPhase::Waiting,
            round_index: 1,
            current: None,
            multiplier: MULTIPLIER_ONE,
            elapsed_ticks: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round_index(&self) -> u64 {
        self.round_index
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn bet(&self, player: &PlayerId, slot: u8) -> Option<&Bet> {
        self.book.get(player, slot)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Place (or replace) a bet while the round is waiting. The debit
    /// is attempted and checked before any bet record exists; replacing
    /// a pending bet refunds its stake first.
    pub fn place_bet(
        &mut self,
        player: PlayerId,
        slot: u8,
        amount: u64,
        auto_cashout: Option<u64>,
    ) -> Result<BetId, EngineError> {
        if self.phase != RoundPhase::Waiting {
            return Err(EngineError::InvalidPhase { phase: self.phase });
        }
        if slot == 0 || slot > self.config.slots_per_player {
            return Err(EngineError::InvalidSlot {
                slot,
                max: self.config.slots_per_player,
            });
        }
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if let Some(threshold) = auto_cashout {
            if threshold <= MULTIPLIER_ONE {
                return Err(EngineError::InvalidThreshold);
            }
        }

        let refund = self
            .book
            .get(&player, slot)
            .filter(|bet| !bet.status.is_terminal())
            .map(|bet| bet.amount);
        if let Some(refund) = refund {
            // The prior bet record stays in place until its stake is
            // back with the player; a failed credit leaves it intact.
            self.ledger.credit(&player, refund)?;
            self.book.remove_pending(&player, slot);
            debug!(player = %player, slot, refunded = refund, "replaced pending bet");
        }

        self.ledger.debit(&player, amount)?;
        let bet_id = self.book.insert(player.clone(), slot, amount, auto_cashout);
        debug!(player = %player, slot, amount, ?auto_cashout, bet_id, "bet placed");
        Ok(bet_id)
    }

    /// Cash out a pending bet at the current multiplier. The bet is
    /// marked cashed out before the ledger credit is attempted; a
    /// failed credit surfaces as `LedgerUnavailable`.
    pub fn cashout(
        &mut self,
        player: &PlayerId,
        slot: u8,
        now_ms: u64,
    ) -> Result<CashoutOutcome, EngineError> {
        if self.phase != RoundPhase::Flying {
            return Err(EngineError::InvalidPhase { phase: self.phase });
        }
        let multiplier = self.multiplier;
        let (bet_id, payout) = match self.book.cash_out(player, slot, multiplier) {
            Some(bet) => (bet.id, bet.payout.unwrap_or(0)),
            None => return Err(EngineError::NoSuchBet),
        };
        self.ledger.credit(player, payout)?;
        info!(player = %player, slot, multiplier, payout, "bet cashed out");

        let mut events = Vec::new();
        if self.all_bets_cashed_out() {
            self.crash(now_ms, &mut events);
        }
        Ok(CashoutOutcome {
            receipt: CashoutReceipt {
                bet_id,
                multiplier,
                payout,
            },
            events,
        })
    }

    /// Point-in-time view for presentation. The crash point is revealed
    /// only once the round has crashed.
    pub fn snapshot(&self, now_ms: u64) -> RoundSnapshot {
        RoundSnapshot {
            round_index: self.round_index,
            phase: self.phase,
            multiplier: self.multiplier,
            countdown_remaining_ms: (self.phase == RoundPhase::Waiting)
                .then(|| self.phase_ends_at_ms.saturating_sub(now_ms)),
            crash_point: (self.phase == RoundPhase::Crashed)
                .then(|| self.current.as_ref().map(|round| round.crash_point))
                .flatten(),
            history: self.history.to_vec(),
        }
    }

    /// Advance the state machine. The driver calls this at the tick
    /// cadence; each call during flight is exactly one curve step, so a
    /// tick count fully determines the multiplier.
    pub fn tick(&mut self, now_ms: u64) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        match self.phase {
            RoundPhase::Waiting => {
                if now_ms >= self.phase_ends_at_ms {
                    self.begin_flight(now_ms, &mut events);
                }
            }
            RoundPhase::Flying => self.advance_flight(now_ms, &mut events),
            RoundPhase::Crashed => {
                if now_ms >= self.phase_ends_at_ms {
                    self.begin_waiting(now_ms, &mut events);
                }
            }
        }
        events
    }

    fn begin_flight(&mut self, now_ms: u64, events: &mut Vec<RoundEvent>) {
        let crash_point = self.policy.crash_point(self.round_index);
        self.current = Some(Round {
            index: self.round_index,
            crash_point,
            started_at_ms: now_ms,
            ended_at_ms: None,
        });
        self.multiplier = MULTIPLIER_ONE;
        self.elapsed_ticks = 0;
        self.phase = RoundPhase::Flying;
        info!(round = self.round_index, crash_point, "round started");
        events.push(RoundEvent::RoundStarted {
            round_index: self.round_index,
        });
    }

    fn advance_flight(&mut self, now_ms: u64, events: &mut Vec<RoundEvent>) {
        let Some(crash_point) = self.current.as_ref().map(|round| round.crash_point) else {
            return;
        };

        // The displayed multiplier never overshoots the crash point.
        self.multiplier = self.curve.advance(self.multiplier).min(crash_point);
        self.elapsed_ticks += 1;
        events.push(RoundEvent::MultiplierTick {
            multiplier: self.multiplier,
        });

        // Auto cashouts settle at their threshold, not the tick value,
        // and strictly before the crash check.
        for (player, slot, threshold) in self.book.crossed_thresholds(self.multiplier) {
            let (bet_id, payout) = match self.book.cash_out(&player, slot, threshold) {
                Some(bet) => (bet.id, bet.payout.unwrap_or(0)),
                None => continue,
            };
            if let Err(err) = self.ledger.credit(&player, payout) {
                // The bet stays cashed out; the ledger owns recovery.
                error!(player = %player, slot, payout, %err, "auto cashout credit failed");
            }
            events.push(RoundEvent::AutoCashout {
                bet_id,
                player,
                slot,
                multiplier: threshold,
                payout,
            });
        }

        if self.all_bets_cashed_out() || self.multiplier >= crash_point {
            self.crash(now_ms, events);
        }
    }

    fn all_bets_cashed_out(&self) -> bool {
        self.config.end_round_when_all_cashed_out
            && !self.book.is_empty()
            && self.book.pending_count() == 0
    }

    fn crash(&mut self, now_ms: u64, events: &mut Vec<RoundEvent>) {
        let Some(round) = self.current.as_mut() else {
            return;
        };
        round.ended_at_ms = Some(now_ms);
        let crash_point = round.crash_point;

        let lost = self.book.settle_pending_as_lost();
        self.history.record(crash_point);
        self.phase = RoundPhase::Crashed;
        self.phase_ends_at_ms = now_ms.saturating_add(self.config.settle_ms);
        info!(round = self.round_index, crash_point, lost, "round crashed");
        events.push(RoundEvent::RoundCrashed {
            round_index: self.round_index,
            crash_point,
        });
    }

    fn begin_waiting(&mut self, now_ms: u64, events: &mut Vec<RoundEvent>) {
        events.push(RoundEvent::RoundSettled {
            round_index: self.round_index,
        });
        self.round_index += 1;
        self.current = None;
        self.book.clear();
        self.multiplier = MULTIPLIER_ONE;
        self.elapsed_ticks = 0;
        self.phase = RoundPhase::Waiting;
        self.phase_ends_at_ms = now_ms.saturating_add(self.config.countdown_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::GeometricCurve;
    use crate::ledger::{InMemoryLedger, LedgerError};
    use crate::policy::BucketedTable;
    use jetstream_types::BetStatus;

    struct FixedPolicy(u64);

    impl CrashPointPolicy for FixedPolicy {
        fn crash_point(&self, _round_index: u64) -> u64 {
            self.0
        }
    }

    /// Ledger whose credits always fail, for fail-closed tests.
    struct CreditlessLedger {
        inner: InMemoryLedger,
    }

    impl BalanceLedger for CreditlessLedger {
        fn debit(&mut self, player: &PlayerId, amount: u64) -> Result<(), LedgerError> {
            self.inner.debit(player, amount)
        }

        fn credit(&mut self, _player: &PlayerId, _amount: u64) -> Result<(), LedgerError> {
            Err(LedgerError::Unavailable("maintenance".to_string()))
        }
    }

    fn alice() -> PlayerId {
        "alice".to_string()
    }

    fn bob() -> PlayerId {
        "bob".to_string()
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            countdown_ms: 1_000,
            tick_ms: 100,
            settle_ms: 500,
            slots_per_player: 2,
            history_capacity: 10,
            end_round_when_all_cashed_out: false,
        }
    }

    fn funded_ledger() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(&alice(), 10_000);
        ledger.deposit(&bob(), 10_000);
        ledger
    }

    fn engine_with(crash_point: u64, config: EngineConfig) -> RoundEngine<InMemoryLedger> {
        RoundEngine::new(
            config,
            Box::new(FixedPolicy(crash_point)),
            Box::new(GeometricCurve::default()),
            funded_ledger(),
            0,
        )
        .expect("engine")
    }

    /// Tick at the configured cadence until the round is flying.
    fn fly(engine: &mut RoundEngine<InMemoryLedger>, now_ms: &mut u64) {
        while engine.phase() != RoundPhase::Flying {
            *now_ms += 100;
            engine.tick(*now_ms);
        }
    }

    /// Tick until the round crashes, collecting all events.
    fn fly_to_crash(engine: &mut RoundEngine<InMemoryLedger>, now_ms: &mut u64) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        while engine.phase() != RoundPhase::Crashed {
            *now_ms += 100;
            events.extend(engine.tick(*now_ms));
        }
        events
    }

    #[test]
    fn test_construction_rejects_bad_config() {
        let config = EngineConfig {
            countdown_ms: 0,
            ..test_config()
        };
        let result = RoundEngine::new(
            config,
            Box::new(BucketedTable),
            Box::new(GeometricCurve::default()),
            funded_ledger(),
            0,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_construction_rejects_invalid_crash_policy() {
        let result = RoundEngine::new(
            test_config(),
            Box::new(FixedPolicy(MULTIPLIER_ONE)),
            Box::new(GeometricCurve::default()),
            funded_ledger(),
            0,
        );
        assert!(matches!(
            result,
            Err(EngineError::InvalidCrashPoint { value: 100, .. })
        ));
    }

    #[test]
    fn test_place_bet_debits_ledger() {
        let mut engine = engine_with(300, test_config());
        let bet_id = engine
            .place_bet(alice(), 1, 100, None)
            .expect("place bet");
        assert!(bet_id > 0);
        assert_eq!(engine.ledger().balance(&alice()), 9_900);
        let bet = engine.bet(&alice(), 1).expect("bet exists");
        assert_eq!(bet.status, BetStatus::Pending);
    }

    #[test]
    fn test_place_bet_validation() {
        let mut engine = engine_with(300, test_config());
        assert_eq!(
            engine.place_bet(alice(), 1, 0, None),
            Err(EngineError::InvalidAmount)
        );
        assert_eq!(
            engine.place_bet(alice(), 1, 100, Some(MULTIPLIER_ONE)),
            Err(EngineError::InvalidThreshold)
        );
        assert_eq!(
            engine.place_bet(alice(), 0, 100, None),
            Err(EngineError::InvalidSlot { slot: 0, max: 2 })
        );
        assert_eq!(
            engine.place_bet(alice(), 3, 100, None),
            Err(EngineError::InvalidSlot { slot: 3, max: 2 })
        );
        // Failed placements leave the ledger untouched.
        assert_eq!(engine.ledger().balance(&alice()), 10_000);
    }

    #[test]
    fn test_place_bet_insufficient_funds_creates_nothing() {
        let mut engine = engine_with(300, test_config());
        let result = engine.place_bet(alice(), 1, 100_000, None);
        assert_eq!(result, Err(EngineError::InsufficientFunds));
        assert!(engine.bet(&alice(), 1).is_none());
        assert_eq!(engine.ledger().balance(&alice()), 10_000);
    }

    #[test]
    fn test_place_bet_rejected_while_flying_and_crashed() {
        let mut engine = engine_with(150, test_config());
        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        assert_eq!(
            engine.place_bet(alice(), 1, 100, None),
            Err(EngineError::InvalidPhase {
                phase: RoundPhase::Flying
            })
        );

        fly_to_crash(&mut engine, &mut now_ms);
        assert_eq!(
            engine.place_bet(alice(), 1, 100, None),
            Err(EngineError::InvalidPhase {
                phase: RoundPhase::Crashed
            })
        );
        assert_eq!(engine.ledger().balance(&alice()), 10_000);
    }

    #[test]
    fn test_replacing_pending_bet_refunds_first() {
        let mut engine = engine_with(300, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("first bet");
        assert_eq!(engine.ledger().balance(&alice()), 9_900);

        engine
            .place_bet(alice(), 1, 250, Some(200))
            .expect("replacement");
        // 10_000 - 100 + 100 - 250
        assert_eq!(engine.ledger().balance(&alice()), 9_750);
        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.amount, 250);
        assert_eq!(bet.auto_cashout, Some(200));
    }

    #[test]
    fn test_replacement_keeps_prior_bet_when_refund_fails() {
        let mut inner = InMemoryLedger::new();
        inner.deposit(&alice(), 1_000);
        let mut engine = RoundEngine::new(
            test_config(),
            Box::new(FixedPolicy(300)),
            Box::new(GeometricCurve::default()),
            CreditlessLedger { inner },
            0,
        )
        .expect("engine");
        engine.place_bet(alice(), 1, 100, None).expect("first bet");

        let result = engine.place_bet(alice(), 1, 250, None);
        assert!(matches!(result, Err(EngineError::LedgerUnavailable(_))));
        // The original bet survives an outage; its stake is not lost.
        let bet = engine.bet(&alice(), 1).expect("prior bet intact");
        assert_eq!(bet.amount, 100);
        assert_eq!(bet.status, BetStatus::Pending);
    }

    #[test]
    fn test_auto_cashout_settles_at_threshold() {
        let mut engine = engine_with(300, test_config());
        engine
            .place_bet(alice(), 1, 100, Some(200))
            .expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        let events = fly_to_crash(&mut engine, &mut now_ms);

        let auto = events
            .iter()
            .find_map(|event| match event {
                RoundEvent::AutoCashout {
                    multiplier, payout, ..
                } => Some((*multiplier, *payout)),
                _ => None,
            })
            .expect("auto cashout event");
        // Settled at the 2.00x threshold, not the overshooting tick.
        assert_eq!(auto, (200, 200));

        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.cashout_multiplier, Some(200));
        assert_eq!(bet.payout, Some(200));
        // 10_000 - 100 + 200
        assert_eq!(engine.ledger().balance(&alice()), 10_100);
    }

    #[test]
    fn test_threshold_above_crash_point_loses() {
        let mut engine = engine_with(300, test_config());
        engine
            .place_bet(alice(), 1, 100, Some(400))
            .expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        fly_to_crash(&mut engine, &mut now_ms);

        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.status, BetStatus::Lost);
        assert_eq!(bet.payout, Some(0));
        assert_eq!(engine.ledger().balance(&alice()), 9_900);
    }

    #[test]
    fn test_threshold_equal_to_crash_point_pays_out() {
        let mut engine = engine_with(200, test_config());
        engine
            .place_bet(alice(), 1, 100, Some(200))
            .expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        fly_to_crash(&mut engine, &mut now_ms);

        // Auto cashout evaluation precedes the crash check.
        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.payout, Some(200));
    }

    #[test]
    fn test_crash_marks_pending_lost_and_clamps_multiplier() {
        let mut engine = engine_with(150, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        let events = fly_to_crash(&mut engine, &mut now_ms);

        // Displayed multiplier equals the crash point exactly.
        assert_eq!(engine.multiplier(), 150);
        for event in &events {
            if let RoundEvent::MultiplierTick { multiplier } = event {
                assert!(*multiplier <= 150);
            }
        }
        assert!(matches!(
            events.last(),
            Some(RoundEvent::RoundCrashed {
                crash_point: 150,
                ..
            })
        ));

        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.status, BetStatus::Lost);
        assert_eq!(bet.payout, Some(0));
        // Stake gone, no credit.
        assert_eq!(engine.ledger().balance(&alice()), 9_900);

        let snapshot = engine.snapshot(now_ms);
        assert_eq!(snapshot.crash_point, Some(150));
        assert_eq!(snapshot.history, vec![150]);
    }

    #[test]
    fn test_manual_cashout_and_idempotence() {
        let mut engine = engine_with(100_000, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        for _ in 0..5 {
            now_ms += 100;
            engine.tick(now_ms);
        }

        let multiplier = engine.multiplier();
        let outcome = engine.cashout(&alice(), 1, now_ms).expect("cashout");
        assert_eq!(outcome.receipt.multiplier, multiplier);
        assert_eq!(outcome.receipt.payout, 100 * multiplier / MULTIPLIER_ONE);
        assert!(outcome.events.is_empty());

        // The second identical cashout is a stale duplicate.
        assert_eq!(
            engine.cashout(&alice(), 1, now_ms),
            Err(EngineError::NoSuchBet)
        );
    }

    #[test]
    fn test_cashout_rejected_outside_flight() {
        let mut engine = engine_with(150, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("place bet");
        assert_eq!(
            engine.cashout(&alice(), 1, 0),
            Err(EngineError::InvalidPhase {
                phase: RoundPhase::Waiting
            })
        );

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        fly_to_crash(&mut engine, &mut now_ms);
        // A cashout racing the crash is rejected, never silently settled.
        assert_eq!(
            engine.cashout(&alice(), 1, now_ms),
            Err(EngineError::InvalidPhase {
                phase: RoundPhase::Crashed
            })
        );
    }

    #[test]
    fn test_cashout_fails_closed_when_ledger_down() {
        let mut inner = InMemoryLedger::new();
        inner.deposit(&alice(), 1_000);
        let mut engine = RoundEngine::new(
            test_config(),
            Box::new(FixedPolicy(100_000)),
            Box::new(GeometricCurve::default()),
            CreditlessLedger { inner },
            0,
        )
        .expect("engine");
        engine.place_bet(alice(), 1, 100, None).expect("place bet");

        let mut now_ms = 0;
        while engine.phase() != RoundPhase::Flying {
            now_ms += 100;
            engine.tick(now_ms);
        }
        now_ms += 100;
        engine.tick(now_ms);

        let result = engine.cashout(&alice(), 1, now_ms);
        assert!(matches!(result, Err(EngineError::LedgerUnavailable(_))));
        // The bet was marked before the credit; status never reverts.
        let bet = engine.bet(&alice(), 1).expect("bet");
        assert_eq!(bet.status, BetStatus::CashedOut);
    }

    #[test]
    fn test_early_end_when_all_bets_cashed_out() {
        let config = EngineConfig {
            end_round_when_all_cashed_out: true,
            ..test_config()
        };
        let mut engine = engine_with(100_000, config);
        engine.place_bet(alice(), 1, 100, None).expect("bet one");
        engine.place_bet(alice(), 2, 100, None).expect("bet two");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        for _ in 0..3 {
            now_ms += 100;
            engine.tick(now_ms);
        }

        let first = engine.cashout(&alice(), 1, now_ms).expect("first cashout");
        assert!(first.events.is_empty());
        assert_eq!(engine.phase(), RoundPhase::Flying);

        // The last cashout ends the round without reaching 1000.00x.
        let second = engine.cashout(&alice(), 2, now_ms).expect("second cashout");
        assert!(matches!(
            second.events.as_slice(),
            [RoundEvent::RoundCrashed { .. }]
        ));
        assert_eq!(engine.phase(), RoundPhase::Crashed);
        assert!(engine.multiplier() < 100_000);
    }

    #[test]
    fn test_no_early_end_when_flag_disabled() {
        let mut engine = engine_with(100_000, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        for _ in 0..3 {
            now_ms += 100;
            engine.tick(now_ms);
        }

        let outcome = engine.cashout(&alice(), 1, now_ms).expect("cashout");
        assert!(outcome.events.is_empty());
        assert_eq!(engine.phase(), RoundPhase::Flying);
    }

    #[test]
    fn test_early_end_via_auto_cashout() {
        let config = EngineConfig {
            end_round_when_all_cashed_out: true,
            ..test_config()
        };
        let mut engine = engine_with(100_000, config);
        engine
            .place_bet(alice(), 1, 100, Some(110))
            .expect("place bet");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        now_ms += 100;
        let events = engine.tick(now_ms); // 1.05x
        assert!(!events
            .iter()
            .any(|event| matches!(event, RoundEvent::RoundCrashed { .. })));
        now_ms += 100;
        let events = engine.tick(now_ms); // 1.10x crosses the threshold
        assert!(events
            .iter()
            .any(|event| matches!(event, RoundEvent::AutoCashout { .. })));
        assert!(matches!(
            events.last(),
            Some(RoundEvent::RoundCrashed { .. })
        ));
    }

    #[test]
    fn test_auto_cashouts_settle_in_book_order() {
        let mut engine = engine_with(300, test_config());
        engine.place_bet(bob(), 1, 100, Some(105)).expect("bob 1");
        engine
            .place_bet(alice(), 2, 100, Some(105))
            .expect("alice 2");
        engine
            .place_bet(alice(), 1, 100, Some(105))
            .expect("alice 1");

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        now_ms += 100;
        let events = engine.tick(now_ms); // 1.05x crosses all three

        let order: Vec<(PlayerId, u8)> = events
            .iter()
            .filter_map(|event| match event {
                RoundEvent::AutoCashout { player, slot, .. } => Some((player.clone(), *slot)),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![(alice(), 1), (alice(), 2), (bob(), 1)]);
    }

    #[test]
    fn test_full_round_cycle() {
        let mut engine = engine_with(150, test_config());
        engine.place_bet(alice(), 1, 100, None).expect("place bet");

        let mut now_ms = 0;
        let mut events = Vec::new();
        // Waiting -> Flying
        while engine.phase() == RoundPhase::Waiting {
            now_ms += 100;
            events.extend(engine.tick(now_ms));
        }
        assert!(matches!(
            events.first(),
            Some(RoundEvent::RoundStarted { round_index: 1 })
        ));

        // Flying -> Crashed -> Waiting
        events.extend(fly_to_crash(&mut engine, &mut now_ms));
        while engine.phase() == RoundPhase::Crashed {
            now_ms += 100;
            events.extend(engine.tick(now_ms));
        }
        assert!(matches!(
            events.last(),
            Some(RoundEvent::RoundSettled { round_index: 1 })
        ));

        // The next round starts clean.
        assert_eq!(engine.round_index(), 2);
        assert_eq!(engine.multiplier(), MULTIPLIER_ONE);
        assert!(engine.bet(&alice(), 1).is_none());
        let snapshot = engine.snapshot(now_ms);
        assert_eq!(snapshot.phase, RoundPhase::Waiting);
        assert!(snapshot.countdown_remaining_ms.is_some());
        assert_eq!(snapshot.crash_point, None);
        assert_eq!(snapshot.history, vec![150]);

        // The freed slot accepts a new bet.
        engine.place_bet(alice(), 1, 100, None).expect("new bet");
    }

    #[test]
    fn test_snapshot_hides_crash_point_until_crashed() {
        let mut engine = engine_with(150, test_config());
        let snapshot = engine.snapshot(0);
        assert_eq!(snapshot.phase, RoundPhase::Waiting);
        assert_eq!(snapshot.countdown_remaining_ms, Some(1_000));
        assert_eq!(snapshot.crash_point, None);

        let mut now_ms = 0;
        fly(&mut engine, &mut now_ms);
        let snapshot = engine.snapshot(now_ms);
        assert_eq!(snapshot.phase, RoundPhase::Flying);
        assert_eq!(snapshot.crash_point, None);
        assert_eq!(snapshot.countdown_remaining_ms, None);
    }

    #[test]
    fn test_history_tracks_recent_rounds() {
        let mut engine = RoundEngine::new(
            test_config(),
            Box::new(BucketedTable),
            Box::new(GeometricCurve::new(300, 100).expect("steep curve")),
            funded_ledger(),
            0,
        )
        .expect("engine");

        let mut now_ms = 0;
        for _ in 0..3 {
            while engine.phase() != RoundPhase::Crashed {
                now_ms += 100;
                engine.tick(now_ms);
            }
            while engine.phase() == RoundPhase::Crashed {
                now_ms += 100;
                engine.tick(now_ms);
            }
        }
        // Rounds 1-3 all sit in the first table bucket.
        assert_eq!(engine.snapshot(now_ms).history, vec![2_000, 2_000, 2_000]);
        assert_eq!(engine.round_index(), 4);
    }
}
