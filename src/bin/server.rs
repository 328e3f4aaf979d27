use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use containment_ops::config::MissionConfig;
use containment_ops::constants::{BUILDING_COUNT, TICK_MS, TICK_RATE, TICK_SECS};
use containment_ops::engine::MissionEngine;
use containment_ops::server_protocol::{parse_client_message, ParsedClientMessage};
use containment_ops::server_utils::{
    normalize_building_count, normalize_deadline_secs, parse_i64, parse_seed,
};
use containment_ops::types::MissionCommand;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    mission: MissionEngine,
    /// Set once the current mission's summary has been broadcast.
    outcome_announced: bool,
    /// Server ticks since the last full grid went out. Counted here because
    /// the mission clock stops while paused or finished.
    ticks_since_grid: u32,
}

impl ServerState {
    fn new(mission: MissionEngine) -> Self {
        Self {
            clients: HashMap::new(),
            mission,
            outcome_announced: false,
            ticks_since_grid: 0,
        }
    }
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let (seed, config) = mission_config_from_env(
        std::env::var("MISSION_SEED").ok().as_deref(),
        std::env::var("MISSION_BUILDINGS").ok().as_deref(),
        std::env::var("MISSION_DEADLINE_SECS").ok().as_deref(),
    );
    let mission =
        MissionEngine::new(Vec::new(), seed, config).expect("normalized mission config is valid");
    println!("[server] mission seed {seed}");

    let state = Arc::new(Mutex::new(ServerState::new(mission)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/summary", get(summary_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. set STATIC_DIR to serve a client.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn mission_config_from_env(
    seed_raw: Option<&str>,
    buildings_raw: Option<&str>,
    deadline_raw: Option<&str>,
) -> (u64, MissionConfig) {
    let seed = parse_seed(seed_raw).unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    let config = MissionConfig {
        building_count: normalize_building_count(parse_i64(buildings_raw), BUILDING_COUNT),
        deadline_secs: normalize_deadline_secs(parse_i64(deadline_raw)),
        ..MissionConfig::default()
    };
    (seed, config)
}

fn resolve_static_dir() -> Option<PathBuf> {
    let raw = std::env::var("STATIC_DIR").ok()?;
    let path = PathBuf::from(raw);
    path.join("index.html").is_file().then_some(path)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn summary_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(guard.mission.build_summary())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard
            .clients
            .insert(client_id.clone(), ClientContext { tx: tx.clone() });
        send_welcome_and_initial_state(&mut guard, &client_id);
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(&state, &client_id, &text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.clients.remove(&client_id);
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error_to_client(state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    match message {
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::Command(command) => {
            let changes_grid = matches!(
                command,
                MissionCommand::Regenerate { .. } | MissionCommand::ToggleFog
            );
            let regenerated = matches!(command, MissionCommand::Regenerate { .. });
            if let Err(error) = guard.mission.apply_command(command) {
                send_to_client(
                    &mut guard,
                    client_id,
                    &json!({
                        "type": "error",
                        "message": error.to_string(),
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
                return;
            }
            if regenerated {
                guard.outcome_announced = false;
                println!("[server] mission regenerated with seed {}", guard.mission.seed());
            }
            if changes_grid {
                broadcast_grid(&mut guard);
            }
        }
    }
}

fn send_welcome_and_initial_state(state: &mut ServerState, client_id: &str) {
    let welcome = json!({
        "type": "welcome",
        "clientId": client_id,
        "seed": state.mission.seed(),
        "tickRate": TICK_RATE,
        "config": state.mission.config,
    });
    send_to_client(state, client_id, &welcome, QueuePolicy::DisconnectOnFull);

    let grid = json!({
        "type": "grid",
        "grid": state.mission.build_grid_snapshot(),
    });
    send_to_client(state, client_id, &grid, QueuePolicy::DisconnectOnFull);

    let snapshot = state.mission.build_snapshot(false);
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_mission(&mut guard);
        }
    });
}

fn grid_refresh_due(ticks_since_grid: u32) -> bool {
    ticks_since_grid >= TICK_RATE
}

fn tick_mission(state: &mut ServerState) {
    state.mission.step(TICK_SECS);
    let snapshot = state.mission.build_snapshot(true);
    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    state.ticks_since_grid += 1;
    if grid_refresh_due(state.ticks_since_grid) {
        broadcast_grid(state);
    }

    if state.mission.is_ended() && !state.outcome_announced {
        state.outcome_announced = true;
        let summary = state.mission.build_summary();
        println!(
            "[server] mission over: {}",
            summary.outcome.map(|o| o.key()).unwrap_or("unknown")
        );
        broadcast(
            state,
            &json!({
                "type": "mission_over",
                "summary": summary,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
}

fn broadcast_grid(state: &mut ServerState) {
    state.ticks_since_grid = 0;
    let grid = json!({
        "type": "grid",
        "grid": state.mission.build_grid_snapshot(),
    });
    broadcast(state, &grid, QueuePolicy::DropOnFull);
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_slow_client(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        disconnect_slow_client(state, &client_id);
    }
}

fn disconnect_slow_client(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let _ = context.tx.try_send(OutboundMessage::Close {
        code: 1013,
        reason: "client too slow".to_string(),
    });
    eprintln!("[server] dropped slow client {client_id}");
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ServerState {
        let (seed, config) = mission_config_from_env(Some("7"), None, None);
        ServerState::new(MissionEngine::new(Vec::new(), seed, config).expect("config"))
    }

    fn attach_client(state: &mut ServerState, id: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(64);
        state.clients.insert(id.to_string(), ClientContext { tx });
        rx
    }

    fn drain_types(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(OutboundMessage::Text(payload)) = rx.try_recv() {
            let value: Value = serde_json::from_str(&payload).expect("json payload");
            types.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        types
    }

    #[test]
    fn env_config_is_normalized() {
        let (seed, config) = mission_config_from_env(Some("99"), Some("400"), Some("5"));
        assert_eq!(seed, 99);
        assert_eq!(config.building_count, 32);
        assert_eq!(config.deadline_secs, 30.0);
        assert!(config.validate().is_ok());

        let (_, config) = mission_config_from_env(None, Some("abc"), None);
        assert_eq!(config.building_count, BUILDING_COUNT);
    }

    #[test]
    fn new_client_gets_welcome_grid_and_state() {
        let mut state = test_state();
        let mut rx = attach_client(&mut state, "client_a");
        send_welcome_and_initial_state(&mut state, "client_a");
        assert_eq!(drain_types(&mut rx), vec!["welcome", "grid", "state"]);
    }

    #[test]
    fn grid_is_resent_once_per_second() {
        let mut state = test_state();
        let mut rx = attach_client(&mut state, "client_a");
        for _ in 0..TICK_RATE {
            tick_mission(&mut state);
        }
        let types = drain_types(&mut rx);
        assert_eq!(types.iter().filter(|t| *t == "state").count(), TICK_RATE as usize);
        assert_eq!(types.iter().filter(|t| *t == "grid").count(), 1);
    }

    #[test]
    fn grid_cadence_holds_while_paused_and_after_the_end() {
        let mut state = test_state();
        let mut rx = attach_client(&mut state, "client_a");
        for _ in 0..TICK_RATE {
            tick_mission(&mut state);
        }
        drain_types(&mut rx);

        state
            .mission
            .apply_command(MissionCommand::TogglePause)
            .expect("pause");
        for _ in 0..TICK_RATE {
            tick_mission(&mut state);
        }
        let paused = drain_types(&mut rx);
        assert_eq!(paused.iter().filter(|t| *t == "grid").count(), 1);

        let (seed, mut config) = mission_config_from_env(Some("7"), None, None);
        config.deadline_secs = 0.01;
        state.mission = MissionEngine::new(Vec::new(), seed, config).expect("config");
        for _ in 0..TICK_RATE {
            tick_mission(&mut state);
        }
        assert!(state.mission.is_ended());
        let ended = drain_types(&mut rx);
        assert_eq!(ended.iter().filter(|t| *t == "grid").count(), 1);
    }

    #[test]
    fn full_queue_disconnects_only_on_strict_policy() {
        let mut state = test_state();
        let (tx, _rx) = mpsc::channel(1);
        state
            .clients
            .insert("slow".to_string(), ClientContext { tx });
        broadcast(&mut state, &json!({"type": "a"}), QueuePolicy::DropOnFull);
        broadcast(&mut state, &json!({"type": "b"}), QueuePolicy::DropOnFull);
        assert!(state.clients.contains_key("slow"));
        broadcast(&mut state, &json!({"type": "c"}), QueuePolicy::DisconnectOnFull);
        assert!(!state.clients.contains_key("slow"));
    }

    #[test]
    fn grid_refresh_cadence_matches_tick_rate() {
        assert!(!grid_refresh_due(0));
        assert!(!grid_refresh_due(TICK_RATE - 1));
        assert!(grid_refresh_due(TICK_RATE));
    }

    #[test]
    fn make_id_is_unique() {
        assert_ne!(make_id("client"), make_id("client"));
    }
}
