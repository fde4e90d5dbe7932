use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::chat::ChatMessage;
use super::member::{ConnectionId, Participant};
use super::playback::Timestamp;
use super::playlist::{MediaRef, PlaylistItem};
use super::room::{Room, RoomId};
use crate::search::MediaItem;

/// Everything the server ever sends to a client.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
  #[serde(rename_all = "camelCase")]
  SelfId { connection_id: ConnectionId },
  #[serde(rename_all = "camelCase")]
  RoomCreated { room_id: RoomId },
  #[serde(rename_all = "camelCase")]
  RoomJoined {
    room_id: RoomId,
    host_id: Option<ConnectionId>,
    members: Vec<Participant>,
    playlist: Vec<PlaylistItem>,
    current_item: Option<MediaRef>,
    playing: bool,
  },
  #[serde(rename_all = "camelCase")]
  MembersUpdate { members: Vec<Participant>, host_id: Option<ConnectionId> },
  ChatMessage(ChatMessage),
  ChatTyping { names: Vec<String> },
  #[serde(rename_all = "camelCase")]
  Play { media_id: String, title: String },
  Pause,
  Resume,
  Seek { seconds: f64 },
  Timestamp(Timestamp),
  Ended,
  PlaylistUpdate { playlist: Vec<PlaylistItem> },
  SearchResults { items: Vec<MediaItem> },
  SearchError { message: String },
  #[serde(rename_all = "camelCase")]
  AnyoneReportTimestamp { requester_id: ConnectionId },
  Pong,
  /// A frame that could not be understood.
  Error { message: String },
}

impl Notification {
  pub fn room_joined(room: &Room) -> Self {
    Self::RoomJoined {
      room_id: room.id.clone(),
      host_id: room.host(),
      members: room.members().to_vec(),
      playlist: room.playlist.items().to_vec(),
      current_item: room.playback.current().cloned(),
      playing: room.playback.is_playing(),
    }
  }

  pub fn members_update(room: &Room) -> Self {
    Self::MembersUpdate { members: room.members().to_vec(), host_id: room.host() }
  }

  pub fn playlist_update(room: &Room) -> Self {
    Self::PlaylistUpdate { playlist: room.playlist.items().to_vec() }
  }
}

impl fmt::Display for Notification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
  }
}

/// One notification addressed to a set of connections.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
  pub recipients: Vec<ConnectionId>,
  pub notification: Notification,
}

impl Dispatch {
  pub fn new(recipients: Vec<ConnectionId>, notification: Notification) -> Self {
    Self { recipients, notification }
  }

  pub fn to(recipient: ConnectionId, notification: Notification) -> Self {
    Self { recipients: vec![recipient], notification }
  }
}

/// Work to run later on behalf of a room.
#[derive(Clone, Debug, PartialEq)]
pub enum FollowUp {
  /// Re-announce position 0 once clients had time to load `media_id`.
  SettleTimestamp { room_id: RoomId, media_id: String, after: Duration },
}

/// Result of handling one intent: what to send now and what to schedule.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
  pub dispatches: Vec<Dispatch>,
  pub follow_ups: Vec<FollowUp>,
}

impl Outcome {
  pub fn none() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.dispatches.is_empty() && self.follow_ups.is_empty()
  }

  pub fn send(&mut self, recipients: Vec<ConnectionId>, notification: Notification) {
    if !recipients.is_empty() {
      self.dispatches.push(Dispatch::new(recipients, notification));
    }
  }

  pub fn send_to(&mut self, recipient: ConnectionId, notification: Notification) {
    self.dispatches.push(Dispatch::to(recipient, notification));
  }

  pub fn schedule(&mut self, follow_up: FollowUp) {
    self.follow_ups.push(follow_up);
  }

  pub fn extend(&mut self, other: Outcome) {
    self.dispatches.extend(other.dispatches);
    self.follow_ups.extend(other.follow_ups);
  }

  /// Notifications received by `connection_id`, in order.
  pub fn received_by(&self, connection_id: ConnectionId) -> Vec<&Notification> {
    self
      .dispatches
      .iter()
      .filter(|dispatch| dispatch.recipients.contains(&connection_id))
      .map(|dispatch| &dispatch.notification)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn wire_names() {
    let id = ConnectionId::new();
    let json = serde_json::to_value(Notification::AnyoneReportTimestamp { requester_id: id });
    assert_eq!(json.unwrap(), json!({ "type": "anyone-report-timestamp", "requesterId": id }));

    let json = serde_json::to_value(Notification::Play { media_id: "a".into(), title: "b".into() });
    assert_eq!(json.unwrap(), json!({ "type": "play", "mediaId": "a", "title": "b" }));

    assert_eq!(Notification::Pause.to_string(), r#"{"type":"pause"}"#);
  }

  #[test]
  fn newtype_variants_are_flattened() {
    let timestamp = Timestamp { media_id: "a".into(), seconds: 1.5, playing: true };
    let json = serde_json::to_value(Notification::Timestamp(timestamp)).unwrap();
    let expected = json!({ "type": "timestamp", "mediaId": "a", "seconds": 1.5, "playing": true });
    assert_eq!(json, expected);
  }

  #[test]
  fn received_by_filters_recipients() {
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    let mut outcome = Outcome::none();
    outcome.send(vec![a, b], Notification::Pause);
    outcome.send_to(b, Notification::Resume);
    outcome.send(vec![], Notification::Ended);
    assert_eq!(outcome.received_by(a), vec![&Notification::Pause]);
    assert_eq!(outcome.received_by(b), vec![&Notification::Pause, &Notification::Resume]);
    assert_eq!(outcome.dispatches.len(), 2);
  }
}
