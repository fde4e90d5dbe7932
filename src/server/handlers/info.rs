use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::server::state::ServerState;
use crate::session::{ConnectionId, MediaRef, Room, RoomId};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomSummary {
  id: RoomId,
  members: usize,
  host_id: Option<ConnectionId>,
  current_item: Option<MediaRef>,
  playing: bool,
  playlist: usize,
}

impl From<&Room> for RoomSummary {
  fn from(room: &Room) -> Self {
    Self {
      id: room.id.clone(),
      members: room.members().len(),
      host_id: room.host(),
      current_item: room.playback.current().cloned(),
      playing: room.playback.is_playing(),
      playlist: room.playlist.len(),
    }
  }
}

pub(crate) async fn info(State(state): State<ServerState>) -> impl IntoResponse {
  let peers = state.hub.peer_count();
  let mut rooms: Vec<RoomSummary> =
    state.hub.coordinator().registry().rooms().map(RoomSummary::from).collect();
  rooms.sort_by(|a, b| a.id.cmp(&b.id));
  Json(json!({ "peers": peers, "rooms": rooms }))
}

pub(crate) async fn test() -> impl IntoResponse {
  Json(json!({ "message": "Server is running" }))
}
