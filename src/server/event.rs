use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::session::{Notification, RoomId};

/// Client intents as they arrive on the wire.
///
/// Canonical names are kebab-case; the colon separated names of older
/// clients are accepted as aliases, as are their field names.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum Intent {
  CreateRoom,
  #[serde(rename_all = "camelCase")]
  JoinRoom {
    room_id: RoomId,
    #[serde(alias = "username", default)]
    display_name: String,
  },
  #[serde(alias = "chat:message", rename_all = "camelCase")]
  ChatMessage { room_id: RoomId, text: String },
  #[serde(alias = "chat:typing", rename_all = "camelCase")]
  ChatTyping { room_id: RoomId, is_typing: bool },
  #[serde(alias = "video:play", alias = "play", rename_all = "camelCase")]
  VideoPlay {
    room_id: RoomId,
    #[serde(alias = "videoId")]
    media_id: String,
    #[serde(default)]
    title: Option<String>,
  },
  #[serde(alias = "video:pause", rename_all = "camelCase")]
  VideoPause { room_id: RoomId },
  #[serde(alias = "video:resume", rename_all = "camelCase")]
  VideoResume { room_id: RoomId },
  #[serde(alias = "seek-video", rename_all = "camelCase")]
  Seek {
    room_id: RoomId,
    #[serde(alias = "seekTime")]
    seconds: f64,
  },
  #[serde(alias = "video:updateTime", rename_all = "camelCase")]
  VideoUpdateTime {
    room_id: RoomId,
    #[serde(alias = "videoId")]
    media_id: String,
    #[serde(alias = "currentTime")]
    seconds: f64,
  },
  #[serde(alias = "video:requestTimestamp", rename_all = "camelCase")]
  VideoRequestTimestamp { room_id: RoomId },
  #[serde(alias = "video:ended", rename_all = "camelCase")]
  VideoEnded { room_id: RoomId },
  #[serde(alias = "video:timestamp", rename_all = "camelCase")]
  VideoTimestamp {
    room_id: RoomId,
    #[serde(alias = "videoId", default)]
    media_id: Option<String>,
    #[serde(alias = "time")]
    seconds: f64,
    #[serde(alias = "isPlaying")]
    playing: bool,
  },
  #[serde(alias = "playlist:add", rename_all = "camelCase")]
  PlaylistAdd {
    room_id: RoomId,
    #[serde(alias = "videoId")]
    media_id: String,
    #[serde(default)]
    title: Option<String>,
  },
  #[serde(alias = "playlist:remove", rename_all = "camelCase")]
  PlaylistRemove {
    room_id: RoomId,
    #[serde(alias = "videoId")]
    media_id: String,
  },
  #[serde(alias = "playlist:clear", rename_all = "camelCase")]
  PlaylistClear { room_id: RoomId },
  #[serde(alias = "playlist:request", rename_all = "camelCase")]
  PlaylistRequest { room_id: RoomId },
  #[serde(alias = "video:search")]
  Search {
    #[serde(default)]
    query: Option<String>,
  },
  Ping,
}

impl FromStr for Intent {
  type Err = serde_json::Error;

  fn from_str(s: &str) -> serde_json::Result<Self> {
    serde_json::from_str(s)
  }
}

/// The reply owed to a sender whose frame did not decode. Search requests
/// get a `search-error`, anything else a generic `error`.
pub(crate) fn rejection(payload: &str, error: &serde_json::Error) -> Notification {
  let kind = serde_json::from_str::<Value>(payload)
    .ok()
    .and_then(|frame| frame.get("type").and_then(Value::as_str).map(str::to_owned));

  match kind.as_deref() {
    Some("search" | "video:search") => {
      Notification::SearchError { message: format!("invalid search request: {error}") }
    }
    _ => Notification::Error { message: format!("invalid request: {error}") },
  }
}
