//! The bet book: bets active in the current round.

use std::collections::BTreeMap;

use jetstream_types::{Bet, BetId, BetStatus, PlayerId, MULTIPLIER_ONE};

/// Payout for a stake at a multiplier in hundredths, rounded down.
pub fn payout_for(amount: u64, multiplier: u64) -> u64 {
    amount.saturating_mul(multiplier) / MULTIPLIER_ONE
}

/// Bets keyed by (player, slot). The BTreeMap keeps settlement order
/// deterministic: player id, then slot number.
#[derive(Clone, Debug, Default)]
pub struct BetBook {
    bets: BTreeMap<(PlayerId, u8), Bet>,
    next_id: BetId,
}

impl BetBook {
    pub fn new() -> Self {
        Self {
            bets: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a pending bet and return its id. The caller must have
    /// removed any prior bet in the slot first.
    pub fn insert(
        &mut self,
        player: PlayerId,
        slot: u8,
        amount: u64,
        auto_cashout: Option<u64>,
    ) -> BetId {
        let id = self.next_id;
        self.next_id += 1;
        self.bets.insert(
            (player.clone(), slot),
            Bet {
                id,
                player,
                slot,
                amount,
                auto_cashout,
                status: BetStatus::Pending,
                cashout_multiplier: None,
                payout: None,
            },
        );
        id
    }

    pub fn get(&self, player: &PlayerId, slot: u8) -> Option<&Bet> {
        self.bets.get(&(player.clone(), slot))
    }

    /// Remove the pending bet in a slot, returning it so its stake can
    /// be refunded. Terminal bets are left in place.
    pub fn remove_pending(&mut self, player: &PlayerId, slot: u8) -> Option<Bet> {
        let key = (player.clone(), slot);
        match self.bets.get(&key) {
            Some(bet) if bet.status == BetStatus::Pending => self.bets.remove(&key),
            _ => None,
        }
    }

    /// Mark the pending bet in a slot as cashed out at `multiplier` and
    /// record its payout. Returns `None` if there is no pending bet.
    pub fn cash_out(&mut self, player: &PlayerId, slot: u8, multiplier: u64) -> Option<&Bet> {
        let key = (player.clone(), slot);
        let bet = self.bets.get_mut(&key)?;
        if bet.status != BetStatus::Pending {
            return None;
        }
        bet.status = BetStatus::CashedOut;
        bet.cashout_multiplier = Some(multiplier);
        bet.payout = Some(payout_for(bet.amount, multiplier));
        Some(&*bet)
    }

    /// Pending bets whose auto-cashout threshold is at or below
    /// `multiplier`, in book order.
    pub fn crossed_thresholds(&self, multiplier: u64) -> Vec<(PlayerId, u8, u64)> {
        self.bets
            .values()
            .filter(|bet| bet.status == BetStatus::Pending)
            .filter_map(|bet| {
                bet.auto_cashout
                    .filter(|threshold| *threshold <= multiplier)
                    .map(|threshold| (bet.player.clone(), bet.slot, threshold))
            })
            .collect()
    }

    /// Mark every remaining pending bet lost with zero payout. The
    /// stake was debited at placement, so no ledger call is needed.
    pub fn settle_pending_as_lost(&mut self) -> usize {
        let mut settled = 0;
        for bet in self.bets.values_mut() {
            if bet.status == BetStatus::Pending {
                bet.status = BetStatus::Lost;
                bet.payout = Some(0);
                settled += 1;
            }
        }
        settled
    }

    pub fn clear(&mut self) {
        self.bets.clear();
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.bets
            .values()
            .filter(|bet| bet.status == BetStatus::Pending)
            .count()
    }

    pub fn bets(&self) -> impl Iterator<Item = &Bet> {
        self.bets.values()
    }
}
