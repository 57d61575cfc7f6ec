//! Bet records and their one-way status transitions.

use serde::{Deserialize, Serialize};

use crate::{BetId, PlayerId};

/// Bet lifecycle. Transitions exactly once from `Pending` to a terminal
/// status, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    CashedOut,
    Lost,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

/// One stake in the current round. At most one bet per (player, slot);
/// amounts are chip units, multipliers are hundredths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: BetId,
    pub player: PlayerId,
    pub slot: u8,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auto_cashout: Option<u64>,
    pub status: BetStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cashout_multiplier: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!BetStatus::Pending.is_terminal());
        assert!(BetStatus::CashedOut.is_terminal());
        assert!(BetStatus::Lost.is_terminal());
    }

    #[test]
    fn test_bet_serialization() {
        let bet = Bet {
            id: 3,
            player: "alice".to_string(),
            slot: 1,
            amount: 100,
            auto_cashout: Some(200),
            status: BetStatus::CashedOut,
            cashout_multiplier: Some(200),
            payout: Some(200),
        };
        let json = serde_json::to_string(&bet).expect("serialize bet");
        assert!(json.contains(r#""status":"cashed_out""#));
        assert!(json.contains(r#""autoCashout":200"#));

        let parsed: Bet = serde_json::from_str(&json).expect("parse bet");
        assert_eq!(parsed, bet);
    }
}
