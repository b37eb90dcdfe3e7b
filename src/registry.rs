//! Bookkeeping of live players, independent of the transport.

use crate::{
  board::Marker,
  ids::{IdGenerator, PlayerId, SessionId},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
  /// Registered but without an opponent.
  Looking,
  Paired,
}

/// A logical participant. Owned by [`PlayerRegistry`]; sessions only refer
/// to players by id.
///
/// Session membership, marker and opponent can only be changed from inside the
/// crate, through the coordinator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
  id: PlayerId,
  name: String,
  status: PlayerStatus,
  session: Option<SessionId>,
  opponent: Option<PlayerId>,
  marker: Option<Marker>,
}

impl Player {
  fn new(id: PlayerId, name: String) -> Self {
    Self {
      id,
      name,
      status: PlayerStatus::Looking,
      session: None,
      opponent: None,
      marker: None,
    }
  }

  pub fn id(&self) -> PlayerId {
    self.id
  }

  /// Display name shown to the opponent.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn status(&self) -> PlayerStatus {
    self.status
  }

  /// Session the player is seated in, if any.
  pub fn session(&self) -> Option<&SessionId> {
    self.session.as_ref()
  }

  /// Current opponent. Always mirrored on the other side.
  pub fn opponent(&self) -> Option<PlayerId> {
    self.opponent
  }

  /// Marker for the player's seat, set while seated.
  pub fn marker(&self) -> Option<Marker> {
    self.marker
  }

  pub(crate) fn rename(&mut self, name: String) {
    self.name = name;
  }

  pub(crate) fn attach(&mut self, session: SessionId, marker: Marker) {
    self.session = Some(session);
    self.marker = Some(marker);
  }

  pub(crate) fn detach(&mut self) {
    self.session = None;
    self.marker = None;
  }
}

/// Every player currently known to the lobby.
#[derive(Debug)]
pub struct PlayerRegistry {
  ids: Arc<IdGenerator>,
  players: HashMap<PlayerId, Player>,
}

impl PlayerRegistry {
  /// Empty registry drawing player ids from `ids`.
  pub fn new(ids: Arc<IdGenerator>) -> Self {
    Self {
      ids,
      players: HashMap::new(),
    }
  }

  /// Allocates a fresh player with no session and no opponent.
  pub fn register(&mut self, name: impl Into<String>) -> &Player {
    let id = self.ids.next_player();
    let player = Player::new(id, name.into());
    tracing::debug!("Registered {} as {}", player.name, id);
    self.players.entry(id).or_insert(player)
  }

  /// Removes a player. Absent ids are ignored so duplicate disconnects are
  /// harmless.
  ///
  /// Callers are expected to have detached and unpaired the player first;
  /// the coordinator's `leave` does both.
  pub fn unregister(&mut self, id: PlayerId) -> Option<Player> {
    let removed = self.players.remove(&id);
    if removed.is_some() {
      tracing::debug!("Unregistered {}", id);
    }
    removed
  }

  /// Look up a player by id.
  pub fn get(&self, id: PlayerId) -> Option<&Player> {
    self.players.get(&id)
  }

  pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
    self.players.get_mut(&id)
  }

  pub fn contains(&self, id: PlayerId) -> bool {
    self.players.contains_key(&id)
  }

  pub fn len(&self) -> usize {
    self.players.len()
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }

  /// Links `a` and `b` as each other's opponent. Both must be registered;
  /// any previous pairing of either side is dissolved first.
  pub(crate) fn pair(&mut self, a: PlayerId, b: PlayerId) -> bool {
    if a == b || !self.contains(a) || !self.contains(b) {
      return false;
    }
    self.unpair(a);
    self.unpair(b);
    for (me, them) in [(a, b), (b, a)] {
      if let Some(player) = self.players.get_mut(&me) {
        player.opponent = Some(them);
        player.status = PlayerStatus::Paired;
      }
    }
    true
  }

  /// Clears the opponent link on both sides. Returns the former opponent.
  pub(crate) fn unpair(&mut self, id: PlayerId) -> Option<PlayerId> {
    let opponent = self.players.get_mut(&id).and_then(|p| {
      p.status = PlayerStatus::Looking;
      p.opponent.take()
    })?;
    if let Some(other) = self.players.get_mut(&opponent) {
      if other.opponent == Some(id) {
        other.opponent = None;
        other.status = PlayerStatus::Looking;
      }
    }
    Some(opponent)
  }
}
