use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::chat::TypingState;
use super::member::{ConnectionId, Participant};
use super::playback::Playback;
use super::playlist::Playlist;

/// Alphabet for generated room codes, without the easily confused 0, O, 1 and I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// A short human shareable code.
  pub fn generate() -> Self {
    let mut rng = rand::thread_rng();
    let code = (0..CODE_LEN)
      .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
      .collect();
    Self(code)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RoomId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug)]
pub struct Room {
  pub id: RoomId,
  host: Option<ConnectionId>,
  members: Vec<Participant>,
  pub playlist: Playlist,
  pub playback: Playback,
  pub typing: TypingState,
  /// Late joiners waiting for a peer to report the position.
  pub pending_timestamps: Vec<ConnectionId>,
  /// Set while the room has no members.
  vacant_since: Option<Instant>,
}

impl Room {
  pub(super) fn new(id: RoomId, now: Instant) -> Self {
    Self {
      id,
      host: None,
      members: Default::default(),
      playlist: Default::default(),
      playback: Default::default(),
      typing: Default::default(),
      pending_timestamps: Default::default(),
      vacant_since: Some(now),
    }
  }

  pub fn host(&self) -> Option<ConnectionId> {
    self.host
  }

  pub fn is_host(&self, connection_id: ConnectionId) -> bool {
    self.host == Some(connection_id)
  }

  /// Members in join order.
  pub fn members(&self) -> &[Participant] {
    &self.members
  }

  pub fn member(&self, connection_id: ConnectionId) -> Option<&Participant> {
    self.members.iter().find(|member| member.id == connection_id)
  }

  pub fn member_ids(&self) -> Vec<ConnectionId> {
    self.members.iter().map(|member| member.id).collect()
  }

  pub fn member_ids_except(&self, excluded: ConnectionId) -> Vec<ConnectionId> {
    self.members.iter().map(|member| member.id).filter(|id| *id != excluded).collect()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  pub fn vacant_since(&self) -> Option<Instant> {
    self.vacant_since
  }

  /// Adds a member unless already present. The first member becomes host.
  pub(super) fn add_member(&mut self, participant: Participant) -> bool {
    if self.member(participant.id).is_some() {
      return false;
    }
    if self.members.is_empty() {
      self.host = Some(participant.id);
    }
    self.members.push(participant);
    self.vacant_since = None;
    true
  }

  /// Removes a member, handing the host role to the earliest joined remaining member.
  pub(super) fn remove_member(
    &mut self,
    connection_id: ConnectionId,
    now: Instant,
  ) -> Option<Participant> {
    let index = self.members.iter().position(|member| member.id == connection_id)?;
    let participant = self.members.remove(index);

    self.typing.clear(connection_id);
    self.pending_timestamps.retain(|id| *id != connection_id);

    if self.members.is_empty() {
      self.host = None;
      self.vacant_since = Some(now);
    } else if self.host == Some(connection_id) {
      self.host = self.members.first().map(|member| member.id);
    }

    Some(participant)
  }
}
