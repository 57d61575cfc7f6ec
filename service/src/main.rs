use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use jetstream_engine::{
    BucketedTable, Clock, CrashPointPolicy, EngineDriver, EngineHandle, GeometricCurve,
    InMemoryLedger, ProvablyFair, RoundEngine, SystemClock,
};
use jetstream_types::{EngineConfig, EngineError, Inbound, Outbound};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Clone, Debug)]
struct ServiceConfig {
    host: String,
    port: u16,
    engine: EngineConfig,
    /// When set, crash points come from the seeded provably-fair policy
    /// instead of the fixed table.
    seed: Option<u64>,
    house_edge_bps: u16,
}

impl ServiceConfig {
    fn from_env() -> Self {
        let defaults = EngineConfig::default();
        Self {
            host: std::env::var("JETSTREAM_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("JETSTREAM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9200),
            engine: EngineConfig {
                countdown_ms: read_ms("JETSTREAM_COUNTDOWN_MS", defaults.countdown_ms),
                tick_ms: read_ms("JETSTREAM_TICK_MS", defaults.tick_ms),
                settle_ms: read_ms("JETSTREAM_SETTLE_MS", defaults.settle_ms),
                slots_per_player: read_u8("JETSTREAM_SLOTS_PER_PLAYER", defaults.slots_per_player),
                history_capacity: read_usize(
                    "JETSTREAM_HISTORY_CAPACITY",
                    defaults.history_capacity,
                ),
                end_round_when_all_cashed_out: read_bool(
                    "JETSTREAM_END_ON_ALL_CASHED_OUT",
                    defaults.end_round_when_all_cashed_out,
                ),
            },
            seed: std::env::var("JETSTREAM_SEED")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok()),
            house_edge_bps: read_u16("JETSTREAM_HOUSE_EDGE_BPS", 100),
        }
    }

    fn policy(&self) -> Box<dyn CrashPointPolicy> {
        match self.seed {
            Some(seed) => Box::new(ProvablyFair::new(seed, self.house_edge_bps)),
            None => Box::new(BucketedTable),
        }
    }
}

fn read_ms(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_u8(key: &str, fallback: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u8>().ok())
        .unwrap_or(fallback)
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn read_bool(key: &str, fallback: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<bool>().ok())
        .unwrap_or(fallback)
}

#[derive(Clone)]
struct AppState {
    handle: EngineHandle<InMemoryLedger, SystemClock>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut events = state.handle.subscribe();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let event_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let Ok(payload) = serde_json::to_string(&Outbound::Event { event }) {
                    let _ = tx.send(Message::Text(payload));
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<Inbound>(&text) {
                Ok(inbound) => handle_inbound(inbound, &state, &tx),
                Err(err) => {
                    warn!(?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    write_task.abort();
    event_task.abort();
}

fn handle_inbound(inbound: Inbound, state: &AppState, tx: &mpsc::UnboundedSender<Message>) {
    let response = match inbound {
        Inbound::Join {
            request_id,
            player_id,
            balance,
        } => {
            if let Some(amount) = balance {
                state
                    .handle
                    .with_ledger(|ledger| ledger.deposit(&player_id, amount));
            }
            Outbound::Ack {
                request_id,
                bet_id: None,
                receipt: None,
                snapshot: Some(state.handle.snapshot()),
            }
        }
        Inbound::PlaceBet {
            request_id,
            player_id,
            slot,
            amount,
            auto_cashout,
        } => match state.handle.place_bet(player_id, slot, amount, auto_cashout) {
            Ok(bet_id) => Outbound::Ack {
                request_id,
                bet_id: Some(bet_id),
                receipt: None,
                snapshot: None,
            },
            Err(err) => error_response(request_id, err),
        },
        Inbound::Cashout {
            request_id,
            player_id,
            slot,
        } => match state.handle.cashout(&player_id, slot) {
            Ok(outcome) => Outbound::Ack {
                request_id,
                bet_id: None,
                receipt: Some(outcome.receipt),
                snapshot: None,
            },
            Err(err) => error_response(request_id, err),
        },
        Inbound::Snapshot { request_id } => Outbound::Ack {
            request_id,
            bet_id: None,
            receipt: None,
            snapshot: Some(state.handle.snapshot()),
        },
    };
    send_response(tx, response);
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: Outbound) {
    if let Ok(payload) = serde_json::to_string(&response) {
        let _ = tx.send(Message::Text(payload));
    }
}

fn error_response(request_id: String, err: EngineError) -> Outbound {
    Outbound::Error {
        request_id,
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env();
    let clock = SystemClock::new();
    let engine = RoundEngine::new(
        config.engine.clone(),
        config.policy(),
        Box::new(GeometricCurve::default()),
        InMemoryLedger::new(),
        clock.now_ms(),
    )
    .map_err(|err| anyhow::anyhow!("engine init failed: {err}"))?;

    let driver = EngineDriver::new(engine, clock);
    let state = AppState {
        handle: driver.handle(),
    };
    driver.spawn();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "jetstream service listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
