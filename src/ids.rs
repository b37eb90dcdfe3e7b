//! Identifier types and the process-wide generator that hands them out.

use serde::{Deserialize, Serialize};
use std::{
  fmt,
  sync::atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl fmt::Display for PlayerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "player-{}", self.0)
  }
}

/// Transport-level identity of one socket. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "conn-{}", self.0)
  }
}

/// Short uppercase game code, e.g. `AAAB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
  const MIN_LEN: usize = 4;

  fn from_sequence(mut n: u64) -> Self {
    let mut letters = Vec::with_capacity(Self::MIN_LEN);
    loop {
      letters.push(b'A' + (n % 26) as u8);
      n /= 26;
      if n == 0 && letters.len() >= Self::MIN_LEN {
        break;
      }
    }
    letters.reverse();
    Self(letters.into_iter().map(char::from).collect())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Monotonic counters for every identifier the lobby issues.
///
/// Share one instance (behind an `Arc`) between the registry, coordinator and
/// transport so ids stay unique per process. Tests build their own to get
/// deterministic values.
#[derive(Debug)]
pub struct IdGenerator {
  players: AtomicU64,
  sessions: AtomicU64,
  connections: AtomicU64,
}

impl IdGenerator {
  pub fn new() -> Self {
    Self::starting_at(0)
  }

  pub fn starting_at(first: u64) -> Self {
    Self {
      players: AtomicU64::new(first),
      sessions: AtomicU64::new(first),
      connections: AtomicU64::new(first),
    }
  }

  pub fn next_player(&self) -> PlayerId {
    PlayerId(self.players.fetch_add(1, Ordering::Relaxed))
  }

  pub fn next_session(&self) -> SessionId {
    SessionId::from_sequence(self.sessions.fetch_add(1, Ordering::Relaxed))
  }

  pub fn next_connection(&self) -> ConnectionId {
    ConnectionId(self.connections.fetch_add(1, Ordering::Relaxed))
  }
}

impl Default for IdGenerator {
  fn default() -> Self {
    Self::new()
  }
}
