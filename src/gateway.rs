//! Translation between transport events and lobby operations.
//!
//! The [`Gateway`] owns the connection to player mapping and turns every
//! inbound event into a list of [`Delivery`]s, each addressed to exactly one
//! connection. It performs no I/O; the transport decides how deliveries reach
//! their sockets.

use crate::{
  board::{Cell, Line, Marker, Outcome},
  config::LobbyConfig,
  error::{JoinError, MoveError},
  ids::{ConnectionId, IdGenerator, PlayerId, SessionId},
  matchmaking::{Coordinator, LobbyStats, MoveResult, Placement},
  registry::PlayerRegistry,
  session::SessionInfo,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

pub const GUEST_NAME: &str = "Guest";

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
  Join {
    #[serde(default)]
    name: Option<String>,
  },
  /// `cell` stays a raw integer so out-of-range values surface as
  /// `InvalidCell` rather than a parse failure.
  Move { cell: i64 },
}

/// A game's result from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
  Win,
  Lose,
  Draw,
}

/// Messages sent to a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
  Paired {
    opponent_name: String,
    marker: Marker,
    session_id: SessionId,
  },
  Waiting {
    session_id: SessionId,
  },
  MoveRejected {
    reason: MoveError,
  },
  OpponentMoved {
    cell: Cell,
  },
  GameOver {
    result: GameResult,
    winning_line: Option<Line>,
  },
  OpponentLeft,
  ServerFull,
}

/// One event for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  pub to: ConnectionId,
  pub event: ServerEvent,
}

impl Delivery {
  fn new(to: ConnectionId, event: ServerEvent) -> Self {
    Self { to, event }
  }
}

pub struct Gateway {
  registry: PlayerRegistry,
  coordinator: Coordinator,
  connections: HashMap<ConnectionId, PlayerId>,
  players: HashMap<PlayerId, ConnectionId>,
}

impl Gateway {
  /// Empty lobby sharing `ids` between players and sessions.
  pub fn new(config: LobbyConfig, ids: Arc<IdGenerator>) -> Self {
    Self {
      registry: PlayerRegistry::new(ids.clone()),
      coordinator: Coordinator::new(config, ids),
      connections: HashMap::new(),
      players: HashMap::new(),
    }
  }

  pub fn registry(&self) -> &PlayerRegistry {
    &self.registry
  }

  pub fn coordinator(&self) -> &Coordinator {
    &self.coordinator
  }

  /// Player bound to `conn`, once it has joined.
  pub fn player_for(&self, conn: ConnectionId) -> Option<PlayerId> {
    self.connections.get(&conn).copied()
  }

  /// Connection a player's events go to.
  pub fn connection_for(&self, player: PlayerId) -> Option<ConnectionId> {
    self.players.get(&player).copied()
  }

  pub fn stats(&self) -> LobbyStats {
    self.coordinator.stats(&self.registry)
  }

  pub fn session_infos(&self) -> Vec<SessionInfo> {
    self.coordinator.session_infos()
  }

  /// Handles one inbound event and returns who must be told what, in order.
  pub fn handle(&mut self, conn: ConnectionId, event: ClientEvent) -> Vec<Delivery> {
    match event {
      ClientEvent::Join { name } => self.join(conn, name),
      ClientEvent::Move { cell } => self.play(conn, cell),
    }
  }

  fn join(&mut self, conn: ConnectionId, name: Option<String>) -> Vec<Delivery> {
    let name = name
      .map(|n| n.trim().to_string())
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| GUEST_NAME.to_string());

    let (player, fresh) = match self.player_for(conn) {
      Some(existing) => {
        let Some(p) = self.registry.get_mut(existing) else {
          return Vec::new();
        };
        if p.session().is_some() {
          debug!("Ignoring join from {}: {} is already seated", conn, existing);
          return Vec::new();
        }
        p.rename(name.clone());
        (existing, false)
      }
      None => (self.registry.register(name.clone()).id(), true),
    };

    let placement = match self.coordinator.join_or_create(&mut self.registry, player) {
      Ok(placement) => placement,
      Err(e) => {
        if fresh {
          self.registry.unregister(player);
        }
        return match e {
          JoinError::CapacityExceeded(_) => {
            info!("Server full, rejected {} on {}", name, conn);
            vec![Delivery::new(conn, ServerEvent::ServerFull)]
          }
          other => {
            warn!("Join from {} failed: {}", conn, other);
            Vec::new()
          }
        };
      }
    };

    if fresh {
      self.connections.insert(conn, player);
      self.players.insert(player, conn);
    }
    info!("{} joined as {} on {} (session {})", name, player, conn, placement.session());

    match placement {
      Placement::Waiting { session } => {
        vec![Delivery::new(conn, ServerEvent::Waiting { session_id: session })]
      }
      Placement::Paired {
        session,
        first,
        second,
      } => [(first, second), (second, first)]
        .into_iter()
        .filter_map(|(me, them)| self.paired_notice(me, them, &session))
        .collect(),
    }
  }

  fn paired_notice(
    &self,
    me: PlayerId,
    them: PlayerId,
    session: &SessionId,
  ) -> Option<Delivery> {
    let to = self.connection_for(me)?;
    let marker = self.registry.get(me)?.marker()?;
    let opponent_name = self.registry.get(them)?.name().to_string();
    Some(Delivery::new(
      to,
      ServerEvent::Paired {
        opponent_name,
        marker,
        session_id: session.clone(),
      },
    ))
  }

  fn play(&mut self, conn: ConnectionId, cell: i64) -> Vec<Delivery> {
    let Some(player) = self.player_for(conn) else {
      debug!("Ignoring move from unjoined {}", conn);
      return Vec::new();
    };
    let index = usize::try_from(cell).unwrap_or(usize::MAX);

    match self.coordinator.play(&mut self.registry, player, index) {
      MoveResult::Ignored => {
        debug!("Ignoring move from {}: no active game", player);
        Vec::new()
      }
      MoveResult::Rejected(reason) => {
        vec![Delivery::new(conn, ServerEvent::MoveRejected { reason })]
      }
      MoveResult::Accepted {
        opponent,
        cell,
        outcome,
        ..
      } => {
        let opponent_conn = self.connection_for(opponent);
        let mut out = Vec::with_capacity(3);
        if let Some(to) = opponent_conn {
          out.push(Delivery::new(to, ServerEvent::OpponentMoved { cell }));
        }

        let results = match outcome {
          Outcome::Continue => None,
          Outcome::Win { line, .. } => Some((GameResult::Win, GameResult::Lose, Some(line))),
          Outcome::Draw => Some((GameResult::Draw, GameResult::Draw, None)),
        };
        if let Some((mine, theirs, winning_line)) = results {
          out.push(Delivery::new(
            conn,
            ServerEvent::GameOver {
              result: mine,
              winning_line,
            },
          ));
          if let Some(to) = opponent_conn {
            out.push(Delivery::new(
              to,
              ServerEvent::GameOver {
                result: theirs,
                winning_line,
              },
            ));
          }
        }
        out
      }
    }
  }

  /// Forgets the connection and its player. Safe to call repeatedly.
  pub fn connection_lost(&mut self, conn: ConnectionId) -> Vec<Delivery> {
    let Some(player) = self.connections.remove(&conn) else {
      return Vec::new();
    };
    self.players.remove(&player);

    let departure = self.coordinator.leave(&mut self.registry, player);
    self.registry.unregister(player);
    info!("{} on {} disconnected", player, conn);

    departure
      .opponent
      .and_then(|opponent| self.connection_for(opponent))
      .map(|to| vec![Delivery::new(to, ServerEvent::OpponentLeft)])
      .unwrap_or_default()
  }
}
