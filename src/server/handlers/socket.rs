use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Error;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tracing::{debug, error, info, instrument, warn};

use crate::server::event::{self, Intent};
use crate::server::hub::{Hub, PeerSender};
use crate::server::state::ServerState;
use crate::session::{ConnectionId, Notification};

pub(crate) async fn socket(
  ws: WebSocketUpgrade,
  State(state): State<ServerState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

#[instrument(name = "socket", skip_all, fields(addr = addr.to_string()))]
async fn handle_socket(socket: WebSocket, state: ServerState, addr: SocketAddr) {
  let (ws_sender, ws_receiver) = socket.split();
  let (sender, receiver) = mpsc::unbounded_channel();
  let hub = state.hub;
  let heartbeat_interval = hub.coordinator().config().heartbeat_interval;
  let connection_id = hub.add_peer(sender.clone());
  info!("{connection_id} connected");

  tokio::select! {
    _ = handle_channel(receiver, ws_sender) => {},
    _ = handle_heartbeats(connection_id, sender, hub.clone(), heartbeat_interval) => {},
    _ = handle_messages(connection_id, ws_receiver, hub.clone()) => {},
  }

  if let Err(e) = hub.remove_peer(connection_id) {
    error!("{e}");
  }
  info!("{connection_id} gone");
}

async fn handle_channel(
  receiver: UnboundedReceiver<Result<Message, Error>>,
  ws_sender: SplitSink<WebSocket, Message>,
) -> Result<()> {
  UnboundedReceiverStream::new(receiver).forward(ws_sender).await.map_err(Into::into)
}

#[instrument(name = "heartbeat", skip_all, fields(peer = connection_id.to_string()))]
async fn handle_heartbeats(
  connection_id: ConnectionId,
  sender: PeerSender,
  hub: Hub,
  period: Duration,
) -> Result<()> {
  let mut stream = IntervalStream::new(tokio::time::interval(period));
  while stream.next().await.is_some() {
    if hub.is_alive(connection_id) {
      debug!("send ping");
      hub.set_peer_alive(connection_id, false)?;
      sender.send(Ok(Message::Ping("".into())))?;
    } else {
      info!("connection timeout");
      break;
    }
  }
  Ok(())
}

#[instrument(name = "message", skip_all, fields(peer = connection_id.to_string()))]
async fn handle_messages(
  connection_id: ConnectionId,
  mut ws_receiver: SplitStream<WebSocket>,
  hub: Hub,
) {
  while let Some(Ok(message)) = ws_receiver.next().await {
    if let Message::Close(_) = message {
      info!("disconnected");
      break;
    }

    if let Err(e) = handle_message(message, connection_id, &hub) {
      error!("{e}")
    }
  }
}

fn handle_message(message: Message, connection_id: ConnectionId, hub: &Hub) -> Result<()> {
  match message {
    Message::Text(payload) => handle_intent(&payload, connection_id, hub),
    Message::Binary(_) => bail!("unsupported binary message"),
    Message::Pong(_) => {
      debug!("recv pong");
      hub.set_peer_alive(connection_id, true)
    }
    Message::Ping(_) | Message::Close(_) => Ok(()),
  }
}

fn handle_intent(payload: &str, id: ConnectionId, hub: &Hub) -> Result<()> {
  let intent: Intent = match payload.parse() {
    Ok(intent) => intent,
    Err(e) => {
      warn!("malformed intent: {e}");
      return hub.send(id, &event::rejection(payload, &e));
    }
  };
  info!("recv intent intent={intent:?}");

  match intent {
    Intent::CreateRoom => hub.apply(|c| c.create_room(id)),
    Intent::JoinRoom { room_id, display_name } => hub.apply(|c| c.join(id, room_id, display_name)),
    Intent::ChatMessage { room_id, text } => hub.apply(|c| c.send_message(id, &room_id, text)),
    Intent::ChatTyping { room_id, is_typing } => {
      hub.apply(|c| c.set_typing(id, &room_id, is_typing))
    }
    Intent::VideoPlay { room_id, media_id, title } => {
      hub.apply(|c| c.play(id, &room_id, media_id, title))
    }
    Intent::VideoPause { room_id } => hub.apply(|c| c.pause(id, &room_id)),
    Intent::VideoResume { room_id } => hub.apply(|c| c.resume(id, &room_id)),
    Intent::Seek { room_id, seconds } => hub.apply(|c| c.seek(id, &room_id, seconds)),
    Intent::VideoUpdateTime { room_id, media_id, seconds } => {
      hub.apply(|c| c.report_time(id, &room_id, &media_id, seconds))
    }
    Intent::VideoRequestTimestamp { room_id } => hub.apply(|c| c.request_timestamp(id, &room_id)),
    Intent::VideoEnded { room_id } => hub.apply(|c| c.ended(id, &room_id)),
    Intent::VideoTimestamp { room_id, media_id, seconds, playing } => {
      hub.apply(|c| c.submit_timestamp(id, &room_id, media_id, seconds, playing))
    }
    Intent::PlaylistAdd { room_id, media_id, title } => {
      hub.apply(|c| c.playlist_add(id, &room_id, media_id, title))
    }
    Intent::PlaylistRemove { room_id, media_id } => {
      hub.apply(|c| c.playlist_remove(id, &room_id, &media_id))
    }
    Intent::PlaylistClear { room_id } => hub.apply(|c| c.playlist_clear(id, &room_id)),
    Intent::PlaylistRequest { room_id } => hub.apply(|c| c.playlist_request(id, &room_id)),
    Intent::Search { query } => {
      let hub = hub.clone();
      tokio::spawn(async move { hub.search(id, query).await });
    }
    Intent::Ping => hub.send(id, &Notification::Pong)?,
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::Value;

  use super::*;
  use crate::search::SearchGateway;
  use crate::session::Coordinator;
  use crate::Config;

  fn connect() -> (Hub, ConnectionId, UnboundedReceiver<Result<Message, Error>>) {
    let hub = Hub::new(Coordinator::new(Config::default()), SearchGateway::offline());
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let id = hub.add_peer(sender);
    // self-id
    receiver.try_recv().unwrap().unwrap();
    (hub, id, receiver)
  }

  fn replies(receiver: &mut UnboundedReceiver<Result<Message, Error>>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(Ok(Message::Text(text))) = receiver.try_recv() {
      frames.push(serde_json::from_str(&text).unwrap());
    }
    frames
  }

  #[test]
  fn malformed_search_gets_search_error() {
    let (hub, id, mut receiver) = connect();
    handle_intent(r#"{"type":"search","query":42}"#, id, &hub).unwrap();

    let frames = replies(&mut receiver);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "search-error");
  }

  #[test]
  fn malformed_intent_gets_error() {
    let (hub, id, mut receiver) = connect();
    handle_intent(r#"{"type":"join-room","displayName":"Ada"}"#, id, &hub).unwrap();
    handle_intent("not json", id, &hub).unwrap();

    let frames = replies(&mut receiver);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["type"], "error");
    assert!(frames[0]["message"].as_str().unwrap().contains("roomId"));
    assert_eq!(frames[1]["type"], "error");
    assert!(hub.coordinator().registry().is_empty());
  }

  #[test]
  fn malformed_frames_reach_only_the_sender() {
    let (hub, a, mut a_receiver) = connect();
    let (sender, mut b_receiver) = mpsc::unbounded_channel();
    let b = hub.add_peer(sender);
    handle_intent(r#"{"type":"join-room","roomId":"R1","displayName":"Ada"}"#, a, &hub).unwrap();
    handle_intent(r#"{"type":"join-room","roomId":"R1","displayName":"Bob"}"#, b, &hub).unwrap();
    replies(&mut a_receiver);
    replies(&mut b_receiver);

    handle_intent(r#"{"type":"seek","roomId":"R1","seconds":"soon"}"#, a, &hub).unwrap();
    assert_eq!(replies(&mut a_receiver)[0]["type"], "error");
    assert!(replies(&mut b_receiver).is_empty());
  }

  #[test]
  fn ping_gets_pong() {
    let (hub, id, mut receiver) = connect();
    handle_intent(r#"{"type":"ping"}"#, id, &hub).unwrap();
    assert_eq!(replies(&mut receiver)[0]["type"], "pong");
  }
}
