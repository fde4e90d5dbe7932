use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::member::{ConnectionId, Participant};
use super::room::{Room, RoomId};

/// In-memory rooms, plus an index of which room each connection belongs to.
#[derive(Debug, Default)]
pub struct RoomRegistry {
  rooms: HashMap<RoomId, Room>,
  memberships: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
  pub fn len(&self) -> usize {
    self.rooms.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rooms.is_empty()
  }

  pub fn rooms(&self) -> impl Iterator<Item = &Room> {
    self.rooms.values()
  }

  pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
    self.rooms.values_mut()
  }

  pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
    self.rooms.get(room_id)
  }

  pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
    self.rooms.get_mut(room_id)
  }

  pub fn get_or_create(&mut self, room_id: &RoomId, now: Instant) -> &mut Room {
    self.rooms.entry(room_id.clone()).or_insert_with(|| {
      debug!("create room room_id={room_id}");
      Room::new(room_id.clone(), now)
    })
  }

  /// Creates an empty room under a freshly generated code.
  pub fn create(&mut self, now: Instant) -> RoomId {
    let mut room_id = RoomId::generate();
    while self.rooms.contains_key(&room_id) {
      room_id = RoomId::generate();
    }
    self.get_or_create(&room_id, now);
    room_id
  }

  pub fn destroy_if_empty(&mut self, room_id: &RoomId) -> bool {
    match self.rooms.get(room_id) {
      Some(room) if room.is_empty() => {
        debug!("destroy room room_id={room_id}");
        self.rooms.remove(room_id);
        true
      }
      _ => false,
    }
  }

  pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomId> {
    self.memberships.get(&connection_id)
  }

  /// Adds the participant to the room, creating the room if needed. Returns
  /// false when the connection was already a member.
  pub fn join(&mut self, room_id: &RoomId, participant: Participant, now: Instant) -> bool {
    self.memberships.insert(participant.id, room_id.clone());
    self.get_or_create(room_id, now).add_member(participant)
  }

  /// Removes the connection from whichever room holds it.
  pub fn leave(
    &mut self,
    connection_id: ConnectionId,
    now: Instant,
  ) -> Option<(RoomId, Participant)> {
    let room_id = self.memberships.remove(&connection_id)?;
    let participant = self.rooms.get_mut(&room_id)?.remove_member(connection_id, now)?;
    Some((room_id, participant))
  }

  /// Drops rooms that have been without members for longer than `ttl`.
  pub fn sweep_vacant(&mut self, now: Instant, ttl: Duration) -> Vec<RoomId> {
    let expired: Vec<RoomId> = self
      .rooms
      .values()
      .filter(|room| room.vacant_since().is_some_and(|since| now.duration_since(since) >= ttl))
      .map(|room| room.id.clone())
      .collect();

    for room_id in &expired {
      debug!("drop vacant room room_id={room_id}");
      self.rooms.remove(room_id);
    }
    expired
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_creates_room_and_indexes_membership() {
    let mut registry = RoomRegistry::default();
    let room_id = RoomId::new("R1");
    let a = Participant::new(ConnectionId::new(), "A");

    assert!(registry.join(&room_id, a.clone(), Instant::now()));
    assert!(!registry.join(&room_id, a.clone(), Instant::now()));
    assert_eq!(registry.room_of(a.id), Some(&room_id));
    assert_eq!(registry.get(&room_id).unwrap().host(), Some(a.id));
  }

  #[test]
  fn last_leave_allows_destroy() {
    let mut registry = RoomRegistry::default();
    let room_id = RoomId::new("R1");
    let a = Participant::new(ConnectionId::new(), "A");
    registry.join(&room_id, a.clone(), Instant::now());

    assert!(!registry.destroy_if_empty(&room_id));
    let (left_room, participant) = registry.leave(a.id, Instant::now()).unwrap();
    assert_eq!(left_room, room_id);
    assert_eq!(participant, a);
    assert!(registry.destroy_if_empty(&room_id));
    assert!(registry.get(&room_id).is_none());
    assert!(registry.room_of(a.id).is_none());
    assert!(registry.leave(a.id, Instant::now()).is_none());
  }

  #[test]
  fn created_rooms_get_unique_codes() {
    let mut registry = RoomRegistry::default();
    let first = registry.create(Instant::now());
    let second = registry.create(Instant::now());
    assert_ne!(first, second);
    assert_eq!(registry.len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn vacant_rooms_are_swept() {
    let ttl = Duration::from_secs(60);
    let mut registry = RoomRegistry::default();
    let vacant = registry.create(Instant::now());
    let occupied = RoomId::new("busy");
    registry.join(&occupied, Participant::new(ConnectionId::new(), "A"), Instant::now());

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(registry.sweep_vacant(Instant::now(), ttl).is_empty());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(registry.sweep_vacant(Instant::now(), ttl), vec![vacant]);
    assert!(registry.get(&occupied).is_some());
  }
}
