//! WebSocket server that feeds socket traffic into the [`Gateway`].

use crate::{
  config::ServerConfig,
  gateway::{ClientEvent, Delivery, Gateway},
  ids::{ConnectionId, IdGenerator},
  matchmaking::LobbyStats,
  session::SessionInfo,
};
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  http::Method,
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, Mutex, RwLock};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub type Clients = HashMap<ConnectionId, mpsc::UnboundedSender<Message>>;
pub type ClientMap = Arc<RwLock<Clients>>;

/// Shared by every socket task.
///
/// The gateway sits behind a single mutex: each inbound event is handled and
/// its deliveries queued before the next event is looked at. Both locks are
/// held before the gateway is touched; nothing awaits between handling an
/// event and queueing its deliveries.
#[derive(Clone)]
pub struct AppState {
  gateway: Arc<Mutex<Gateway>>,
  clients: ClientMap,
  ids: Arc<IdGenerator>,
}

impl AppState {
  pub fn new(config: &ServerConfig, ids: Arc<IdGenerator>) -> Self {
    Self {
      gateway: Arc::new(Mutex::new(Gateway::new(config.lobby.clone(), ids.clone()))),
      clients: Arc::new(RwLock::new(HashMap::new())),
      ids,
    }
  }

  /// Outbound channels keyed by connection.
  pub fn clients(&self) -> &ClientMap {
    &self.clients
  }

  /// Current lobby counters.
  pub async fn stats(&self) -> LobbyStats {
    self.gateway.lock().await.stats()
  }

  /// Registers an outbound channel for a new socket.
  pub async fn connect(&self, tx: mpsc::UnboundedSender<Message>) -> ConnectionId {
    let conn = self.ids.next_connection();
    self.clients.write().await.insert(conn, tx);
    conn
  }

  /// Parses and handles one text frame from `conn`.
  pub async fn on_text(&self, conn: ConnectionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
      Ok(event) => event,
      Err(e) => {
        tracing::warn!("Failed to parse message from {}: {} ({})", conn, text, e);
        return;
      }
    };

    let mut gateway = self.gateway.lock().await;
    let clients = self.clients.read().await;
    let deliveries = gateway.handle(conn, event);
    dispatch(&clients, deliveries);
  }

  /// Drops the socket's channel and tells the gateway it is gone.
  pub async fn disconnect(&self, conn: ConnectionId) {
    self.clients.write().await.remove(&conn);

    let mut gateway = self.gateway.lock().await;
    let clients = self.clients.read().await;
    let deliveries = gateway.connection_lost(conn);
    dispatch(&clients, deliveries);
  }
}

/// Serializes each delivery and queues it on its recipient's socket.
/// Deliveries for sockets that have already gone are dropped.
pub fn dispatch(clients: &Clients, deliveries: Vec<Delivery>) {
  for Delivery { to, event } in deliveries {
    let json = match serde_json::to_string(&event) {
      Ok(json) => json,
      Err(e) => {
        tracing::error!("Serialization error for {}: {}", to, e);
        continue;
      }
    };
    match clients.get(&to) {
      Some(sender) => {
        if sender.send(Message::Text(json.into())).is_err() {
          tracing::warn!("Failed to queue message for {}", to);
        }
      }
      None => tracing::debug!("Dropping message for departed {}", to),
    }
  }
}

pub struct Server {
  config: ServerConfig,
}

impl Server {
  pub fn new(config: ServerConfig) -> Self {
    Self { config }
  }

  /// Routes for the socket endpoint and the read-only JSON views.
  pub fn router(&self) -> Router {
    let state = AppState::new(&self.config, Arc::new(IdGenerator::new()));

    let cors = CorsLayer::new()
      .allow_methods([Method::GET])
      .allow_origin(Any);

    Router::new()
      .route("/ws", get(ws_handler))
      .route("/stats", get(stats_handler))
      .route("/sessions", get(sessions_handler))
      .with_state(state)
      .layer(cors)
      .layer(TraceLayer::new_for_http())
  }

  /// Binds the configured port and serves until the listener fails.
  pub async fn listen(self) -> anyhow::Result<()> {
    let addr = self.config.addr();
    let app = self.router();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
      "Lobby listening on {} (max {} concurrent games)",
      addr,
      self.config.lobby.max_concurrent_games
    );
    axum::serve(listener, app).await?;
    Ok(())
  }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn stats_handler(State(state): State<AppState>) -> Json<LobbyStats> {
  Json(state.stats().await)
}

async fn sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
  Json(state.gateway.lock().await.session_infos())
}

/// Runs one socket until either direction closes, then reports the loss.
async fn handle_ws(ws: WebSocket, state: AppState) {
  let (mut sender_ws, mut receiver_ws) = ws.split();
  let (tx, mut rx) = mpsc::unbounded_channel();

  let conn = state.connect(tx).await;
  tracing::info!("New connection {}", conn);

  // Pump queued messages out to the socket
  let mut sender_task = tokio::spawn(async move {
    while let Some(msg) = rx.recv().await {
      if sender_ws.send(msg).await.is_err() {
        tracing::warn!("Failed to send message to {}", conn);
        break;
      }
    }
  });

  let receiver_state = state.clone();
  let mut receiver_task = tokio::spawn(async move {
    while let Some(Ok(msg)) = receiver_ws.next().await {
      match msg {
        Message::Text(text) => receiver_state.on_text(conn, text.as_str()).await,
        Message::Close(_) => {
          tracing::info!("{} closed connection", conn);
          break;
        }
        _ => {}
      }
    }
  });

  tokio::select! {
    _ = &mut receiver_task => sender_task.abort(),
    _ = &mut sender_task => receiver_task.abort(),
  }

  state.disconnect(conn).await;
  tracing::info!("Connection {} cleaned up", conn);
}
