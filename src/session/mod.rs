//! The room session coordinator.
//!
//! [`Coordinator`] owns every room and exposes one method per client intent.
//! Each method validates the intent against the current room state, mutates
//! it, and returns an [`Outcome`] listing the notifications to deliver. It
//! never touches the network; the transport layer turns outcomes into sends.
//!
//! Missing rooms or connections are not errors: the intent is dropped and the
//! outcome is empty.

mod chat;
mod member;
mod notification;
mod playback;
mod playlist;
mod registry;
mod room;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::Config;

pub use self::chat::{ChatMessage, MessageKind, TypingState};
pub use self::member::{ConnectionId, Participant};
pub use self::notification::{Dispatch, FollowUp, Notification, Outcome};
pub use self::playback::{clamp_seconds, Playback, PlaybackState, Timestamp, UNKNOWN_TRACK};
pub use self::playlist::{MediaRef, Playlist, PlaylistItem, UNTITLED};
pub use self::registry::RoomRegistry;
pub use self::room::{Room, RoomId};

const ANONYMOUS: &str = "Anonymous";

#[derive(Debug)]
pub struct Coordinator {
  config: Config,
  registry: RoomRegistry,
  rng: StdRng,
}

impl Coordinator {
  pub fn new(config: Config) -> Self {
    Self { config, registry: RoomRegistry::default(), rng: StdRng::from_entropy() }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn registry(&self) -> &RoomRegistry {
    &self.registry
  }

  pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
    self.registry.get(room_id)
  }

  pub fn connect(&mut self, connection_id: ConnectionId) -> Outcome {
    let mut outcome = Outcome::none();
    outcome.send_to(connection_id, Notification::SelfId { connection_id });
    outcome
  }

  pub fn create_room(&mut self, connection_id: ConnectionId) -> Outcome {
    let room_id = self.registry.create(Instant::now());
    info!("{connection_id} created room room_id={room_id}");

    let mut outcome = Outcome::none();
    outcome.send_to(connection_id, Notification::RoomCreated { room_id });
    outcome
  }

  // Membership

  /// Joins (or re-joins) a room, creating it if needed.
  pub fn join(
    &mut self,
    connection_id: ConnectionId,
    room_id: RoomId,
    display_name: impl Into<String>,
  ) -> Outcome {
    let mut outcome = Outcome::none();

    // A connection belongs to one room at a time
    if self.registry.room_of(connection_id).is_some_and(|current| *current != room_id) {
      outcome.extend(self.leave(connection_id));
    }

    let participant = Participant::new(connection_id, display_name);
    let added = self.registry.join(&room_id, participant.clone(), Instant::now());
    let Some(room) = self.registry.get(&room_id) else {
      return outcome;
    };

    if added {
      info!("{connection_id} joined room room_id={room_id} name={}", participant.display_name);
      outcome.send(
        room.member_ids_except(connection_id),
        Notification::ChatMessage(ChatMessage::joined(&participant)),
      );
    } else {
      debug!("{connection_id} re-joined room room_id={room_id}");
    }
    outcome.send_to(connection_id, Notification::room_joined(room));
    outcome.send(room.member_ids(), Notification::members_update(room));
    outcome
  }

  /// Removes a connection from its room, handing off the host role and
  /// destroying the room when it empties.
  pub fn leave(&mut self, connection_id: ConnectionId) -> Outcome {
    let now = Instant::now();
    let (was_host, was_typing) = self
      .registry
      .room_of(connection_id)
      .cloned()
      .and_then(|room_id| self.registry.get_mut(&room_id))
      .map(|room| (room.is_host(connection_id), room.typing.clear(connection_id)))
      .unwrap_or_default();

    let Some((room_id, participant)) = self.registry.leave(connection_id, now) else {
      debug!("{connection_id} left no room");
      return Outcome::none();
    };
    info!("{connection_id} left room room_id={room_id}");

    if self.registry.destroy_if_empty(&room_id) {
      info!("room is empty, destroyed room_id={room_id}");
      return Outcome::none();
    }

    let mut outcome = Outcome::none();
    let Some(room) = self.registry.get(&room_id) else {
      return outcome;
    };
    if let Some(host) = room.host().filter(|_| was_host) {
      info!("{host} is now host of room_id={room_id}");
    }
    outcome.send(room.member_ids(), Notification::members_update(room));
    outcome.send(room.member_ids(), Notification::ChatMessage(ChatMessage::left(&participant)));
    if was_typing {
      typing_update(room, None, &mut outcome);
    }
    outcome
  }

  // Chat and presence

  pub fn send_message(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    text: String,
  ) -> Outcome {
    let Some(room) = self.registry.get_mut(room_id) else {
      debug!("chat message for missing room room_id={room_id}");
      return Outcome::none();
    };
    if text.trim().is_empty() {
      return Outcome::none();
    }

    let mut outcome = Outcome::none();
    if room.typing.clear(connection_id) {
      typing_update(room, None, &mut outcome);
    }

    let sender_name =
      room.member(connection_id).map(|member| member.display_name.as_str()).unwrap_or(ANONYMOUS);
    let message = ChatMessage::text(connection_id, sender_name, text);
    outcome.send(room.member_ids(), Notification::ChatMessage(message));
    outcome
  }

  pub fn set_typing(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    is_typing: bool,
  ) -> Outcome {
    let ttl = self.config.typing_ttl;
    let Some(room) = self.registry.get_mut(room_id) else {
      return Outcome::none();
    };
    let Some(participant) = room.member(connection_id).cloned() else {
      debug!("{connection_id} is not a member of room_id={room_id}");
      return Outcome::none();
    };

    room.typing.set(&participant, is_typing, Instant::now(), ttl);

    let mut outcome = Outcome::none();
    typing_update(room, Some(connection_id), &mut outcome);
    outcome
  }

  // Playback

  pub fn play(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    media_id: String,
    title: Option<String>,
  ) -> Outcome {
    if media_id.trim().is_empty() {
      return Outcome::none();
    }
    let settle_delay = self.config.settle_delay;
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };

    let item = MediaRef::new(media_id, title);
    let MediaRef { media_id, title } = &item;
    info!("{connection_id} plays room_id={room_id} media_id={media_id} title={title}");

    room.playback.play(item.clone(), Instant::now());
    if room.playlist.add(item.clone()) {
      debug!("added {} to playlist of room_id={room_id}", item.media_id);
    }
    room.pending_timestamps.clear();

    let mut outcome = Outcome::none();
    let members = room.member_ids();
    outcome.send(
      members.clone(),
      Notification::Play { media_id: item.media_id.clone(), title: item.title },
    );
    outcome.send(members, Notification::playlist_update(room));
    outcome.schedule(FollowUp::SettleTimestamp {
      room_id: room_id.clone(),
      media_id: item.media_id,
      after: settle_delay,
    });
    outcome
  }

  /// Announces position 0 of a freshly started item, if it is still loaded.
  pub fn settle_timestamp(&mut self, room_id: &RoomId, media_id: &str) -> Outcome {
    let mut outcome = Outcome::none();
    let Some(room) = self.registry.get(room_id) else {
      return outcome;
    };
    if !room.playback.is_current(media_id) {
      debug!("skip settle timestamp, {media_id} is no longer loaded in room_id={room_id}");
      return outcome;
    }

    let timestamp = Timestamp { media_id: media_id.to_owned(), seconds: 0.0, playing: true };
    outcome.send(room.member_ids(), Notification::Timestamp(timestamp));
    outcome
  }

  pub fn pause(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    info!("{connection_id} paused room_id={room_id}");
    room.playback.pause(Instant::now());

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::Pause);
    outcome
  }

  pub fn resume(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    info!("{connection_id} resumed room_id={room_id}");
    room.playback.resume(Instant::now());

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::Resume);
    outcome
  }

  pub fn seek(&mut self, connection_id: ConnectionId, room_id: &RoomId, seconds: f64) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    let seconds = room.playback.seek(seconds, Instant::now());
    info!("{connection_id} seeked room_id={room_id} seconds={seconds}");

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::Seek { seconds });
    outcome
  }

  pub fn ended(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    info!("{connection_id} ended playback room_id={room_id}");
    room.playback.end(Instant::now());

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::Ended);
    outcome
  }

  /// Periodic position report from a playing client. Satisfies pending
  /// timestamp requests, otherwise re-broadcast with a low probability.
  pub fn report_time(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    media_id: &str,
    seconds: f64,
  ) -> Outcome {
    let sample_rate = self.config.timestamp_sample_rate;
    let Some(room) = self.registry.get_mut(room_id) else {
      return Outcome::none();
    };
    if !room.playback.report(media_id, seconds, Instant::now()) {
      debug!("{connection_id} reported time for stale media_id={media_id}");
      return Outcome::none();
    }
    let Some(timestamp) = room.playback.timestamp() else {
      return Outcome::none();
    };

    let mut outcome = Outcome::none();
    if !room.pending_timestamps.is_empty() {
      let requesters = std::mem::take(&mut room.pending_timestamps);
      debug!("answer {} pending timestamp requests in room_id={room_id}", requesters.len());
      outcome.send(requesters, Notification::Timestamp(timestamp));
    } else if self.rng.gen::<f64>() < sample_rate {
      outcome.send(room.member_ids(), Notification::Timestamp(timestamp));
    }
    outcome
  }

  /// A late joiner asks where playback is.
  pub fn request_timestamp(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let freshness = self.config.position_freshness;
    let Some(room) = self.registry.get_mut(room_id) else {
      return Outcome::none();
    };
    if room.playback.current().is_none() {
      return Outcome::none();
    }

    let mut outcome = Outcome::none();
    match (room.playback.known_position(Instant::now(), freshness), room.playback.timestamp()) {
      (Some(_), Some(timestamp)) => {
        debug!("{connection_id} gets stored timestamp seconds={}", timestamp.seconds);
        outcome.send_to(connection_id, Notification::Timestamp(timestamp));
      }
      _ => {
        debug!("{connection_id} waits for a peer timestamp in room_id={room_id}");
        if !room.pending_timestamps.contains(&connection_id) {
          room.pending_timestamps.push(connection_id);
        }
        outcome.send(
          room.member_ids_except(connection_id),
          Notification::AnyoneReportTimestamp { requester_id: connection_id },
        );
      }
    }
    outcome
  }

  /// A peer's full playback view, taken as authoritative.
  pub fn submit_timestamp(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    media_id: Option<String>,
    seconds: f64,
    playing: bool,
  ) -> Outcome {
    let Some(room) = self.registry.get_mut(room_id) else {
      return Outcome::none();
    };

    let item = media_id.filter(|id| !id.trim().is_empty()).map(|media_id| {
      room
        .playback
        .current()
        .filter(|current| current.media_id == media_id)
        .or_else(|| room.playlist.items().iter().find(|item| item.media_id == media_id))
        .cloned()
        .unwrap_or_else(|| MediaRef { media_id, title: UNKNOWN_TRACK.to_owned() })
    });
    if !room.playback.submit(item, seconds, playing, Instant::now()) {
      debug!("{connection_id} submitted a timestamp without media to idle room_id={room_id}");
      return Outcome::none();
    }

    let Some(timestamp) = room.playback.timestamp() else {
      return Outcome::none();
    };
    debug!("{connection_id} submitted timestamp seconds={}", timestamp.seconds);

    let mut outcome = Outcome::none();
    if room.pending_timestamps.is_empty() {
      outcome.send(room.member_ids(), Notification::Timestamp(timestamp));
    } else {
      let requesters = std::mem::take(&mut room.pending_timestamps);
      outcome.send(requesters, Notification::Timestamp(timestamp));
    }
    outcome
  }

  // Playlist

  pub fn playlist_add(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    media_id: String,
    title: Option<String>,
  ) -> Outcome {
    if media_id.trim().is_empty() {
      return Outcome::none();
    }
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    if room.playlist.add(MediaRef::new(media_id, title)) {
      debug!("{connection_id} added to playlist of room_id={room_id}");
    }

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::playlist_update(room));
    outcome
  }

  pub fn playlist_remove(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
    media_id: &str,
  ) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    if room.playlist.remove(media_id) {
      debug!("{connection_id} removed {media_id} from playlist of room_id={room_id}");
    }

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::playlist_update(room));
    outcome
  }

  pub fn playlist_clear(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let Some(room) = self.controlled_room(connection_id, room_id) else {
      return Outcome::none();
    };
    debug!("{connection_id} cleared playlist of room_id={room_id}");
    room.playlist.clear();

    let mut outcome = Outcome::none();
    outcome.send(room.member_ids(), Notification::playlist_update(room));
    outcome
  }

  pub fn playlist_request(&mut self, connection_id: ConnectionId, room_id: &RoomId) -> Outcome {
    let mut outcome = Outcome::none();
    if let Some(room) = self.registry.get(room_id) {
      outcome.send_to(connection_id, Notification::playlist_update(room));
    }
    outcome
  }

  // Housekeeping

  /// Expires typing indicators and drops rooms that nobody ever joined.
  pub fn sweep(&mut self, now: Instant) -> Outcome {
    let mut outcome = Outcome::none();
    for room in self.registry.rooms_mut() {
      if room.typing.expire(now) {
        debug!("typing indicators expired in room_id={}", room.id);
        typing_update(room, None, &mut outcome);
      }
    }

    for room_id in self.registry.sweep_vacant(now, self.config.vacant_room_ttl) {
      info!("dropped vacant room room_id={room_id}");
    }
    outcome
  }

  /// The room, if it exists and `connection_id` may drive its playback and playlist.
  fn controlled_room(
    &mut self,
    connection_id: ConnectionId,
    room_id: &RoomId,
  ) -> Option<&mut Room> {
    let host_controls = self.config.host_controls;
    let Some(room) = self.registry.get_mut(room_id) else {
      debug!("intent for missing room room_id={room_id}");
      return None;
    };
    if host_controls && !room.is_host(connection_id) {
      debug!("{connection_id} is not the host of room_id={room_id}");
      return None;
    }
    Some(room)
  }
}

/// Sends every member except `skip` the names of the other typists.
fn typing_update(room: &Room, skip: Option<ConnectionId>, outcome: &mut Outcome) {
  for member in room.members().iter().filter(|member| Some(member.id) != skip) {
    let names = room.typing.names_except(Some(member.id));
    outcome.send_to(member.id, Notification::ChatTyping { names });
  }
}
