//! Two-player tic-tac-toe lobby.
//!
//! Anonymous visitors connect over a WebSocket, get paired into sessions by
//! the [`matchmaking::Coordinator`], and play on a server-authoritative
//! [`board::Board`]. The [`gateway::Gateway`] maps connections to players and
//! decides who hears about what.

pub mod board;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod matchmaking;
pub mod registry;
pub mod server;
pub mod session;

pub use board::{Board, Cell, Marker, Outcome, Played, Status, Winner};
pub use config::{LobbyConfig, ServerConfig};
pub use error::{ConfigError, JoinError, MoveError};
pub use gateway::{ClientEvent, Delivery, Gateway, ServerEvent};
pub use ids::{ConnectionId, IdGenerator, PlayerId, SessionId};
pub use matchmaking::{Coordinator, MoveResult, Placement};
pub use registry::{Player, PlayerRegistry};
pub use server::Server;

use dotenv::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Loads `.env`, installs the tracing subscriber and serves until the
/// listener fails.
pub async fn run() -> anyhow::Result<()> {
  dotenv().ok();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
          "{}=debug,tower_http=debug,axum::rejection=trace",
          env!("CARGO_CRATE_NAME")
        )
        .into()
      }),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = ServerConfig::from_env()?;
  Server::new(config).listen().await
}
