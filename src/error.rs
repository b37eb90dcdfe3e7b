use crate::ids::{PlayerId, SessionId};
use serde::Serialize;
use thiserror::Error;

/// Reasons a move is refused by the board. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum MoveError {
  #[error("Game is not active")]
  InactiveGame,

  #[error("Not your turn")]
  OutOfTurn,

  #[error("Invalid cell")]
  InvalidCell,

  #[error("Cell is already occupied")]
  CellOccupied,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
  #[error("Server is full ({0} concurrent games)")]
  CapacityExceeded(usize),

  #[error("Unknown player {0}")]
  UnknownPlayer(PlayerId),

  #[error("Player is already seated in session {0}")]
  AlreadyInSession(SessionId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Invalid MAX_CONCURRENT_GAMES '{0}': expected a positive integer")]
  InvalidCapacity(String),

  #[error("Invalid PORT '{0}'")]
  InvalidPort(String),
}
