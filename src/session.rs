//! A single two-player game: a [`Board`] plus the players seated at it.

use crate::{
  board::{Board, BoardSnapshot, Marker, Status},
  ids::{PlayerId, SessionId},
};
use serde::Serialize;

pub const SEATS: usize = 2;

/// Public view of a session's current state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
  pub session_id: SessionId,
  pub players: Vec<PlayerId>,
  pub board: BoardSnapshot,
}

pub struct GameSession {
  id: SessionId,
  board: Board,
  /// Seat order decides markers: the first seated player is X.
  players: Vec<PlayerId>,
}

impl GameSession {
  /// Empty session with a waiting board.
  pub fn new(id: SessionId) -> Self {
    Self {
      id,
      board: Board::new(),
      players: Vec::with_capacity(SEATS),
    }
  }

  pub fn id(&self) -> &SessionId {
    &self.id
  }

  pub fn board(&self) -> &Board {
    &self.board
  }

  pub(crate) fn board_mut(&mut self) -> &mut Board {
    &mut self.board
  }

  /// Seated players in seat order.
  pub fn players(&self) -> &[PlayerId] {
    &self.players
  }

  /// Seats a player and returns the marker for their seat. Filling the
  /// second seat starts the game. `None` if the session is full or the
  /// player is already seated.
  pub(crate) fn add_player(&mut self, player: PlayerId) -> Option<Marker> {
    if self.is_full() || self.players.contains(&player) {
      return None;
    }
    self.players.push(player);

    if self.is_full() {
      self.board.start();
      Some(Marker::O)
    } else {
      Some(Marker::X)
    }
  }

  /// Frees `player`'s seat. Returns `false` if they were not seated.
  pub(crate) fn remove_player(&mut self, player: PlayerId) -> bool {
    let before = self.players.len();
    self.players.retain(|p| *p != player);
    self.players.len() != before
  }

  /// The other seated player, if `player` is seated and not alone.
  pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
    if !self.players.contains(&player) {
      return None;
    }
    self.players.iter().copied().find(|p| *p != player)
  }

  pub fn status(&self) -> Status {
    self.board.status()
  }

  /// Open for a second player.
  pub fn is_waiting(&self) -> bool {
    self.status() == Status::Waiting && self.players.len() == 1
  }

  pub fn is_full(&self) -> bool {
    self.players.len() >= SEATS
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }

  pub fn get_info(&self) -> SessionInfo {
    SessionInfo {
      session_id: self.id.clone(),
      players: self.players.clone(),
      board: self.board.snapshot(),
    }
  }
}
