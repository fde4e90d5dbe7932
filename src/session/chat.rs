use std::collections::HashMap;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::time::Instant;
use ulid::Ulid;

use super::member::{ConnectionId, Participant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
  Text,
  System,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
  pub id: String,
  pub kind: MessageKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sender_id: Option<ConnectionId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sender_name: Option<String>,
  pub text: String,
  pub timestamp: String,
}

impl ChatMessage {
  pub fn text(sender_id: ConnectionId, sender_name: impl Into<String>, text: String) -> Self {
    Self {
      id: new_message_id(),
      kind: MessageKind::Text,
      sender_id: Some(sender_id),
      sender_name: Some(sender_name.into()),
      text,
      timestamp: now_iso8601(),
    }
  }

  pub fn system(text: String) -> Self {
    Self {
      id: new_message_id(),
      kind: MessageKind::System,
      sender_id: None,
      sender_name: None,
      text,
      timestamp: now_iso8601(),
    }
  }

  pub fn joined(participant: &Participant) -> Self {
    Self::system(format!("{} has joined the room", participant.display_name))
  }

  pub fn left(participant: &Participant) -> Self {
    Self::system(format!("{} has left the room", participant.display_name))
  }
}

fn new_message_id() -> String {
  Ulid::new().to_string().to_lowercase()
}

fn now_iso8601() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug)]
struct Typist {
  name: String,
  since: Instant,
  expires_at: Instant,
}

/// Who is currently composing a message in a room. Entries expire on their own.
#[derive(Clone, Debug, Default)]
pub struct TypingState {
  typists: HashMap<ConnectionId, Typist>,
}

impl TypingState {
  /// Marks or unmarks a typist, returning whether the visible set changed.
  pub fn set(
    &mut self,
    participant: &Participant,
    is_typing: bool,
    now: Instant,
    ttl: Duration,
  ) -> bool {
    if !is_typing {
      return self.clear(participant.id);
    }

    match self.typists.get_mut(&participant.id) {
      Some(typist) => {
        typist.expires_at = now + ttl;
        false
      }
      None => {
        let typist =
          Typist { name: participant.display_name.clone(), since: now, expires_at: now + ttl };
        self.typists.insert(participant.id, typist);
        true
      }
    }
  }

  pub fn clear(&mut self, connection_id: ConnectionId) -> bool {
    self.typists.remove(&connection_id).is_some()
  }

  /// Drops expired entries, returning whether anything was removed.
  pub fn expire(&mut self, now: Instant) -> bool {
    let before = self.typists.len();
    self.typists.retain(|_, typist| typist.expires_at > now);
    self.typists.len() != before
  }

  pub fn is_empty(&self) -> bool {
    self.typists.is_empty()
  }

  /// Display names of everyone typing, oldest first.
  pub fn names(&self) -> Vec<String> {
    self.names_except(None)
  }

  pub fn names_except(&self, excluded: Option<ConnectionId>) -> Vec<String> {
    let mut typists: Vec<_> =
      self.typists.iter().filter(|(id, _)| Some(**id) != excluded).map(|(_, t)| t).collect();
    typists.sort_by_key(|typist| typist.since);
    typists.into_iter().map(|typist| typist.name.clone()).collect()
  }
}
