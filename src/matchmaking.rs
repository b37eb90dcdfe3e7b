//! Matchmaking and the set of active game sessions.
//!
//! The [`Coordinator`] is the only place where players are seated, paired,
//! unpaired and where sessions are created or retired. It never owns players;
//! every operation takes the [`PlayerRegistry`] it should act on, so the two
//! can live side by side behind a single lock.

use crate::{
  board::{Cell, Outcome, Played},
  config::LobbyConfig,
  error::{JoinError, MoveError},
  ids::{IdGenerator, PlayerId, SessionId},
  registry::PlayerRegistry,
  session::{GameSession, SessionInfo},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a joining player ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
  /// Sole occupant of a new session.
  Waiting { session: SessionId },
  /// Took the second seat of an open session; `first` holds X, `second` O.
  Paired {
    session: SessionId,
    first: PlayerId,
    second: PlayerId,
  },
}

impl Placement {
  /// Session the player was seated in.
  pub fn session(&self) -> &SessionId {
    match self {
      Placement::Waiting { session } | Placement::Paired { session, .. } => session,
    }
  }
}

/// What became of a move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
  /// The mover has no live session or opponent; nothing happened.
  Ignored,
  Rejected(MoveError),
  Accepted {
    session: SessionId,
    opponent: PlayerId,
    cell: Cell,
    outcome: Outcome,
  },
}

/// What `leave` tore down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
  pub session: Option<SessionId>,
  pub opponent: Option<PlayerId>,
  pub retired: bool,
}

/// Counters served on `/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyStats {
  pub active_sessions: usize,
  pub waiting_sessions: usize,
  pub players: usize,
  pub max_concurrent_games: usize,
}

pub struct Coordinator {
  config: LobbyConfig,
  ids: Arc<IdGenerator>,
  /// Creation order; the oldest open session is filled first.
  sessions: Vec<GameSession>,
}

impl Coordinator {
  /// Coordinator with no sessions, drawing session ids from `ids`.
  pub fn new(config: LobbyConfig, ids: Arc<IdGenerator>) -> Self {
    Self {
      config,
      ids,
      sessions: Vec::new(),
    }
  }

  /// Maximum number of concurrent sessions.
  pub fn capacity(&self) -> usize {
    self.config.max_concurrent_games
  }

  /// Number of active sessions.
  pub fn len(&self) -> usize {
    self.sessions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sessions.is_empty()
  }

  /// Look up an active session.
  pub fn session(&self, id: &SessionId) -> Option<&GameSession> {
    self.sessions.iter().find(|s| s.id() == id)
  }

  fn session_mut(&mut self, id: &SessionId) -> Option<&mut GameSession> {
    self.sessions.iter_mut().find(|s| s.id() == id)
  }

  /// Public view of every active session, oldest first.
  pub fn session_infos(&self) -> Vec<SessionInfo> {
    self.sessions.iter().map(GameSession::get_info).collect()
  }

  /// Snapshot of session and player counts.
  pub fn stats(&self, registry: &PlayerRegistry) -> LobbyStats {
    LobbyStats {
      active_sessions: self.sessions.len(),
      waiting_sessions: self.sessions.iter().filter(|s| s.is_waiting()).count(),
      players: registry.len(),
      max_concurrent_games: self.capacity(),
    }
  }

  /// Seats `player` in the oldest open session, or in a new one if capacity
  /// allows.
  ///
  /// At capacity, a session with nobody seated is reclaimed before giving up
  /// with [`JoinError::CapacityExceeded`]. On error the player is left
  /// untouched.
  pub fn join_or_create(
    &mut self,
    registry: &mut PlayerRegistry,
    player: PlayerId,
  ) -> Result<Placement, JoinError> {
    let current = registry
      .get(player)
      .ok_or(JoinError::UnknownPlayer(player))?;
    if let Some(session) = current.session() {
      return Err(JoinError::AlreadyInSession(session.clone()));
    }

    if let Some(open) = self.sessions.iter_mut().find(|s| s.is_waiting()) {
      let first = open.players()[0];
      if let Some(marker) = open.add_player(player) {
        let session = open.id().clone();
        if let Some(p) = registry.get_mut(player) {
          p.attach(session.clone(), marker);
        }
        registry.pair(first, player);
        info!("Session {} started: {} vs {}", session, first, player);
        return Ok(Placement::Paired {
          session,
          first,
          second: player,
        });
      }
    }

    if self.sessions.len() >= self.capacity() {
      match self.sessions.iter().position(GameSession::is_empty) {
        Some(idx) => {
          let reclaimed = self.sessions.remove(idx);
          warn!("Reclaimed empty session {} at capacity", reclaimed.id());
        }
        None => {
          warn!(
            "Capacity of {} sessions reached, rejecting {}",
            self.capacity(),
            player
          );
          return Err(JoinError::CapacityExceeded(self.capacity()));
        }
      }
    }

    let mut session = GameSession::new(self.ids.next_session());
    let id = session.id().clone();
    if let Some(marker) = session.add_player(player) {
      if let Some(p) = registry.get_mut(player) {
        p.attach(id.clone(), marker);
      }
    }
    self.sessions.push(session);
    info!("Session {} created for {}", id, player);
    Ok(Placement::Waiting { session: id })
  }

  /// Removes a session from the active set and releases anyone still seated.
  /// Returns `false` if it was already gone.
  pub fn retire(&mut self, registry: &mut PlayerRegistry, session: &SessionId) -> bool {
    let Some(idx) = self.sessions.iter().position(|s| s.id() == session) else {
      return false;
    };
    let retired = self.sessions.remove(idx);
    for &player in retired.players() {
      registry.unpair(player);
      if let Some(p) = registry.get_mut(player) {
        p.detach();
      }
    }
    info!("Session {} retired", session);
    true
  }

  /// Detaches `player` from its session and opponent.
  ///
  /// A session left empty, or one whose game had already started, is retired.
  /// The surviving opponent is unpaired and unseated but never re-queued.
  pub fn leave(&mut self, registry: &mut PlayerRegistry, player: PlayerId) -> Departure {
    let opponent = registry.unpair(player);
    let session = registry.get_mut(player).and_then(|p| {
      let session = p.session().cloned();
      p.detach();
      session
    });

    let mut retired = false;
    if let Some(id) = &session {
      let should_retire = match self.session_mut(id) {
        Some(s) => {
          s.remove_player(player);
          s.is_empty() || !s.is_waiting()
        }
        None => false,
      };
      if should_retire {
        retired = self.retire(registry, id);
      }
    }

    debug!("{} left (session {:?}, opponent {:?})", player, session, opponent);
    Departure {
      session,
      opponent,
      retired,
    }
  }

  /// Applies `player`'s move to their session's board.
  ///
  /// Moves from players without a live, paired session are ignored. A move
  /// that ends the game retires the session.
  pub fn play(
    &mut self,
    registry: &mut PlayerRegistry,
    player: PlayerId,
    cell: usize,
  ) -> MoveResult {
    let Some(mover) = registry.get(player) else {
      return MoveResult::Ignored;
    };
    let (Some(session_id), Some(opponent), Some(marker)) =
      (mover.session().cloned(), mover.opponent(), mover.marker())
    else {
      return MoveResult::Ignored;
    };
    let Some(session) = self.session_mut(&session_id) else {
      return MoveResult::Ignored;
    };

    let Played { cell, outcome } = match session.board_mut().apply(marker, cell) {
      Ok(played) => played,
      Err(e) => {
        warn!("Rejected move by {} on {} in {}: {}", player, cell, session_id, e);
        return MoveResult::Rejected(e);
      }
    };
    debug!("{} ({}) played {} in {}", player, marker, cell, session_id);

    if outcome.is_terminal() {
      info!("Session {} finished: {:?}", session_id, outcome);
      self.retire(registry, &session_id);
    }

    MoveResult::Accepted {
      session: session_id,
      opponent,
      cell,
      outcome,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    board::{Marker, Status},
    registry::PlayerStatus,
  };

  fn lobby(capacity: usize) -> (Coordinator, PlayerRegistry) {
    let ids = Arc::new(IdGenerator::new());
    let config = LobbyConfig {
      max_concurrent_games: capacity,
    };
    (
      Coordinator::new(config, ids.clone()),
      PlayerRegistry::new(ids),
    )
  }

  fn join(
    coord: &mut Coordinator,
    registry: &mut PlayerRegistry,
    name: &str,
  ) -> (PlayerId, Placement) {
    let id = registry.register(name).id();
    let placement = coord.join_or_create(registry, id).unwrap();
    (id, placement)
  }

  #[test]
  fn first_joiner_waits_with_x() {
    let (mut coord, mut registry) = lobby(2);
    let (a, placement) = join(&mut coord, &mut registry, "alice");

    let session = placement.session().clone();
    assert_eq!(placement, Placement::Waiting { session: session.clone() });
    assert_eq!(coord.session(&session).unwrap().status(), Status::Waiting);

    let alice = registry.get(a).unwrap();
    assert_eq!(alice.marker(), Some(Marker::X));
    assert_eq!(alice.session(), Some(&session));
    assert_eq!(alice.opponent(), None);
  }

  #[test]
  fn second_joiner_gets_o_and_starts_game() {
    let (mut coord, mut registry) = lobby(2);
    let (a, first) = join(&mut coord, &mut registry, "alice");
    let (b, second) = join(&mut coord, &mut registry, "bob");

    assert_eq!(
      second,
      Placement::Paired {
        session: first.session().clone(),
        first: a,
        second: b
      }
    );
    assert_eq!(coord.len(), 1);
    assert_eq!(coord.session(first.session()).unwrap().status(), Status::Playing);

    let bob = registry.get(b).unwrap();
    assert_eq!(bob.marker(), Some(Marker::O));
    assert_eq!(bob.opponent(), Some(a));
    assert_eq!(bob.status(), PlayerStatus::Paired);
    assert_eq!(registry.get(a).unwrap().opponent(), Some(b));
  }

  #[test]
  fn third_joiner_opens_a_new_session() {
    let (mut coord, mut registry) = lobby(2);
    join(&mut coord, &mut registry, "alice");
    join(&mut coord, &mut registry, "bob");
    let (_, placement) = join(&mut coord, &mut registry, "carol");

    assert!(matches!(placement, Placement::Waiting { .. }));
    assert_eq!(coord.len(), 2);
  }

  #[test]
  fn join_beyond_capacity_is_rejected() {
    let (mut coord, mut registry) = lobby(1);
    join(&mut coord, &mut registry, "alice");
    join(&mut coord, &mut registry, "bob");

    let carol = registry.register("carol").id();
    assert_eq!(
      coord.join_or_create(&mut registry, carol),
      Err(JoinError::CapacityExceeded(1))
    );
    assert_eq!(coord.len(), 1);
    assert!(registry.get(carol).unwrap().session().is_none());
  }

  #[test]
  fn empty_session_is_reclaimed_at_capacity() {
    let (mut coord, mut registry) = lobby(1);
    let (a, placement) = join(&mut coord, &mut registry, "alice");
    // Force an empty session into the active set.
    let stale = placement.session().clone();
    coord.session_mut(&stale).unwrap().remove_player(a);
    if let Some(p) = registry.get_mut(a) {
      p.detach();
    }

    let (_, placement) = join(&mut coord, &mut registry, "bob");
    assert!(matches!(placement, Placement::Waiting { .. }));
    assert_ne!(placement.session(), &stale);
    assert_eq!(coord.len(), 1);
  }

  #[test]
  fn joining_twice_is_refused() {
    let (mut coord, mut registry) = lobby(2);
    let (a, placement) = join(&mut coord, &mut registry, "alice");
    assert_eq!(
      coord.join_or_create(&mut registry, a),
      Err(JoinError::AlreadyInSession(placement.session().clone()))
    );
    assert_eq!(coord.len(), 1);
  }

  #[test]
  fn leaving_mid_game_retires_session_and_frees_opponent() {
    let (mut coord, mut registry) = lobby(2);
    let (a, placement) = join(&mut coord, &mut registry, "alice");
    let (b, _) = join(&mut coord, &mut registry, "bob");

    let departure = coord.leave(&mut registry, a);
    assert_eq!(departure.opponent, Some(b));
    assert_eq!(departure.session.as_ref(), Some(placement.session()));
    assert!(departure.retired);

    assert!(coord.session(placement.session()).is_none());
    let bob = registry.get(b).unwrap();
    assert_eq!(bob.opponent(), None);
    assert_eq!(bob.session(), None);
    assert_eq!(bob.status(), PlayerStatus::Looking);
  }

  #[test]
  fn leaving_a_waiting_session_retires_it() {
    let (mut coord, mut registry) = lobby(2);
    let (a, _) = join(&mut coord, &mut registry, "alice");

    let departure = coord.leave(&mut registry, a);
    assert!(departure.retired);
    assert_eq!(departure.opponent, None);
    assert!(coord.is_empty());
  }

  #[test]
  fn leave_and_retire_are_idempotent() {
    let (mut coord, mut registry) = lobby(2);
    let (a, placement) = join(&mut coord, &mut registry, "alice");
    coord.leave(&mut registry, a);

    assert_eq!(coord.leave(&mut registry, a), Departure::default());
    assert!(!coord.retire(&mut registry, placement.session()));
  }

  #[test]
  fn survivor_is_not_requeued() {
    let (mut coord, mut registry) = lobby(2);
    let (a, _) = join(&mut coord, &mut registry, "alice");
    let (b, _) = join(&mut coord, &mut registry, "bob");
    coord.leave(&mut registry, a);

    assert!(coord.is_empty());
    // An explicit join puts the survivor back into matchmaking.
    let placement = coord.join_or_create(&mut registry, b).unwrap();
    assert!(matches!(placement, Placement::Waiting { .. }));
  }

  #[test]
  fn moves_are_arbitrated_and_terminal_moves_retire() {
    let (mut coord, mut registry) = lobby(2);
    let (a, placement) = join(&mut coord, &mut registry, "alice");
    let (b, _) = join(&mut coord, &mut registry, "bob");
    let session = placement.session().clone();

    assert_eq!(
      coord.play(&mut registry, b, 0),
      MoveResult::Rejected(MoveError::OutOfTurn)
    );

    for (player, cell) in [(a, 0), (b, 3), (a, 1), (b, 4)] {
      assert!(matches!(
        coord.play(&mut registry, player, cell),
        MoveResult::Accepted {
          outcome: Outcome::Continue,
          ..
        }
      ));
    }
    assert_eq!(
      coord.play(&mut registry, b, 5),
      MoveResult::Rejected(MoveError::OutOfTurn)
    );
    assert_eq!(
      coord.play(&mut registry, a, 3),
      MoveResult::Rejected(MoveError::CellOccupied)
    );

    let result = coord.play(&mut registry, a, 2);
    let line = [Cell::ALL[0], Cell::ALL[1], Cell::ALL[2]];
    assert_eq!(
      result,
      MoveResult::Accepted {
        session: session.clone(),
        opponent: b,
        cell: Cell::ALL[2],
        outcome: Outcome::Win {
          marker: Marker::X,
          line
        },
      }
    );

    assert!(coord.session(&session).is_none());
    assert!(registry.get(a).unwrap().session().is_none());
    assert!(registry.get(b).unwrap().opponent().is_none());
    assert_eq!(coord.play(&mut registry, b, 5), MoveResult::Ignored);
  }

  #[test]
  fn moves_without_an_opponent_are_ignored() {
    let (mut coord, mut registry) = lobby(2);
    let (a, _) = join(&mut coord, &mut registry, "alice");
    assert_eq!(coord.play(&mut registry, a, 0), MoveResult::Ignored);

    let idle = registry.register("idle").id();
    assert_eq!(coord.play(&mut registry, idle, 0), MoveResult::Ignored);

    let gone = registry.register("gone").id();
    registry.unregister(gone);
    assert_eq!(coord.play(&mut registry, gone, 0), MoveResult::Ignored);
  }

  #[test]
  fn invalid_cell_is_rejected() {
    let (mut coord, mut registry) = lobby(2);
    let (a, _) = join(&mut coord, &mut registry, "alice");
    join(&mut coord, &mut registry, "bob");
    assert_eq!(
      coord.play(&mut registry, a, 9),
      MoveResult::Rejected(MoveError::InvalidCell)
    );
  }

  #[test]
  fn stats_count_sessions_and_players() {
    let (mut coord, mut registry) = lobby(3);
    join(&mut coord, &mut registry, "alice");
    join(&mut coord, &mut registry, "bob");
    join(&mut coord, &mut registry, "carol");

    let stats = coord.stats(&registry);
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.waiting_sessions, 1);
    assert_eq!(stats.players, 3);
    assert_eq!(stats.max_concurrent_games, 3);
  }
}
