//! Wire-level command and event messages.
//!
//! Envelope shapes follow the websocket protocol style of the rest of
//! the stack: a tagged `type` field, camelCase keys, request ids echoed
//! back on acks and errors.

use serde::{Deserialize, Serialize};

use crate::round::RoundSnapshot;
use crate::{BetId, PlayerId};

/// Events emitted by the round engine, broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RoundEvent {
    RoundStarted {
        round_index: u64,
    },
    MultiplierTick {
        multiplier: u64,
    },
    AutoCashout {
        bet_id: BetId,
        player: PlayerId,
        slot: u8,
        multiplier: u64,
        payout: u64,
    },
    RoundCrashed {
        round_index: u64,
        crash_point: u64,
    },
    RoundSettled {
        round_index: u64,
    },
}

/// Result of a successful cashout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashoutReceipt {
    pub bet_id: BetId,
    pub multiplier: u64,
    pub payout: u64,
}

/// Client-to-service messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Inbound {
    Join {
        request_id: String,
        player_id: PlayerId,
        balance: Option<u64>,
    },
    PlaceBet {
        request_id: String,
        player_id: PlayerId,
        slot: u8,
        amount: u64,
        auto_cashout: Option<u64>,
    },
    Cashout {
        request_id: String,
        player_id: PlayerId,
        slot: u8,
    },
    Snapshot {
        request_id: String,
    },
}

/// Service-to-client messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Outbound {
    Ack {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        bet_id: Option<BetId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        receipt: Option<CashoutReceipt>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<RoundSnapshot>,
    },
    Error {
        request_id: String,
        code: String,
        message: String,
    },
    Event {
        event: RoundEvent,
    },
}
