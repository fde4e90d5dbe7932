use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::Message;
use axum::Error;
use futures_util::StreamExt;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, warn};

use crate::search::SearchGateway;
use crate::session::{ConnectionId, Coordinator, Dispatch, FollowUp, Notification, Outcome};

pub type PeerSender = UnboundedSender<Result<Message, Error>>;

#[derive(Debug)]
struct Peer {
  sender: PeerSender,
  is_alive: bool,
}

/// Binds live connections to the coordinator.
///
/// Every intent runs under the coordinator lock and its notifications are
/// queued on the recipients' channels before the lock is released, so all
/// members of a room observe events in processing order.
#[derive(Clone, Debug)]
pub struct Hub {
  coordinator: Arc<Mutex<Coordinator>>,
  peers: Arc<RwLock<HashMap<ConnectionId, Peer>>>,
  search: SearchGateway,
}

impl Hub {
  pub fn new(coordinator: Coordinator, search: SearchGateway) -> Self {
    Self {
      coordinator: Arc::new(Mutex::new(coordinator)),
      peers: Default::default(),
      search,
    }
  }

  pub fn coordinator(&self) -> MutexGuard<'_, Coordinator> {
    self.coordinator.lock()
  }

  pub fn peer_count(&self) -> usize {
    self.peers.read().len()
  }

  pub fn search_gateway(&self) -> &SearchGateway {
    &self.search
  }

  pub fn add_peer(&self, sender: PeerSender) -> ConnectionId {
    let connection_id = ConnectionId::new();
    debug!("add peer");

    self.peers.write().insert(connection_id, Peer { sender, is_alive: true });
    self.apply(|coordinator| coordinator.connect(connection_id));
    connection_id
  }

  pub fn remove_peer(&self, connection_id: ConnectionId) -> Result<()> {
    debug!("remove peer");

    // Leave the room first so the departing peer is not addressed anymore
    self.apply(|coordinator| coordinator.leave(connection_id));
    self
      .peers
      .write()
      .remove(&connection_id)
      .with_context(|| format!("peer {connection_id} does not exist"))?;

    Ok(())
  }

  pub fn set_peer_alive(&self, connection_id: ConnectionId, is_alive: bool) -> Result<()> {
    debug!("set peer alive is_alive={is_alive}");

    self
      .peers
      .write()
      .get_mut(&connection_id)
      .with_context(|| format!("peer {connection_id} does not exist"))?
      .is_alive = is_alive;

    Ok(())
  }

  pub fn is_alive(&self, connection_id: ConnectionId) -> bool {
    self.peers.read().get(&connection_id).map(|peer| peer.is_alive).unwrap_or(false)
  }

  /// Runs one coordinator operation and delivers its outcome.
  pub fn apply(&self, operation: impl FnOnce(&mut Coordinator) -> Outcome) {
    let follow_ups = {
      let mut coordinator = self.coordinator.lock();
      let outcome = operation(&mut *coordinator);
      self.deliver(&outcome.dispatches);
      outcome.follow_ups
    };

    for follow_up in follow_ups {
      self.schedule(follow_up);
    }
  }

  pub fn send(&self, connection_id: ConnectionId, notification: &Notification) -> Result<()> {
    let payload = notification.to_string();
    debug!("send payload={payload}");

    self
      .peers
      .read()
      .get(&connection_id)
      .with_context(|| format!("peer {connection_id} does not exist"))?
      .sender
      .send(Ok(Message::Text(payload)))
      .map_err(Into::into)
  }

  /// Runs a search for one connection and replies to it alone.
  pub async fn search(&self, connection_id: ConnectionId, query: Option<String>) {
    let query = query.unwrap_or_default();
    let notification = match self.search.search(&query).await {
      Ok(items) => Notification::SearchResults { items },
      Err(e) => Notification::SearchError { message: e.to_string() },
    };

    if let Err(e) = self.send(connection_id, &notification) {
      warn!("{e}");
    }
  }

  /// Periodically expires typing indicators and vacant rooms.
  pub async fn run(self) -> Result<()> {
    let period = self.coordinator.lock().config().sweep_interval;
    let mut stream = IntervalStream::new(tokio::time::interval(period));

    while stream.next().await.is_some() {
      self.apply(|coordinator| coordinator.sweep(Instant::now()));
    }

    Ok(())
  }

  fn deliver(&self, dispatches: &[Dispatch]) {
    for Dispatch { recipients, notification } in dispatches {
      let payload = notification.to_string();
      let peers = self.peers.read();
      for connection_id in recipients {
        let Some(peer) = peers.get(connection_id) else {
          debug!("skip send to gone peer {connection_id}");
          continue;
        };
        if let Err(e) = peer.sender.send(Ok(Message::Text(payload.clone()))) {
          error!("send to {connection_id} failed: {e}");
        }
      }
    }
  }

  fn schedule(&self, follow_up: FollowUp) {
    let hub = self.clone();
    match follow_up {
      FollowUp::SettleTimestamp { room_id, media_id, after } => {
        tokio::spawn(async move {
          tokio::time::sleep(after).await;
          hub.apply(|coordinator| coordinator.settle_timestamp(&room_id, &media_id));
        });
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use serde_json::Value;
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;
  use crate::session::RoomId;
  use crate::Config;

  fn hub() -> Hub {
    Hub::new(Coordinator::new(Config::default()), SearchGateway::offline())
  }

  fn connect(hub: &Hub) -> (ConnectionId, UnboundedReceiver<Result<Message, Error>>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (hub.add_peer(sender), receiver)
  }

  fn drain(receiver: &mut UnboundedReceiver<Result<Message, Error>>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(Ok(Message::Text(text))) = receiver.try_recv() {
      frames.push(serde_json::from_str(&text).unwrap());
    }
    frames
  }

  fn types(frames: &[Value]) -> Vec<&str> {
    frames.iter().map(|frame| frame["type"].as_str().unwrap()).collect()
  }

  #[tokio::test]
  async fn connect_sends_self_id() {
    let hub = hub();
    let (id, mut receiver) = connect(&hub);
    let frames = drain(&mut receiver);
    assert_eq!(types(&frames), vec!["self-id"]);
    assert_eq!(frames[0]["connectionId"], serde_json::to_value(id).unwrap());
  }

  #[tokio::test(start_paused = true)]
  async fn play_is_followed_by_settle_timestamp() {
    let hub = hub();
    let (a, mut receiver) = connect(&hub);
    let room_id = RoomId::new("R1");
    hub.apply(|c| c.join(a, room_id.clone(), "Ada"));
    hub.apply(|c| c.play(a, &room_id, "abc12345678".into(), Some("Song".into())));
    drain(&mut receiver);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let frames = drain(&mut receiver);
    assert_eq!(types(&frames), vec!["timestamp"]);
    assert_eq!(frames[0]["seconds"], 0.0);
    assert_eq!(frames[0]["playing"], true);
  }

  #[tokio::test]
  async fn disconnect_hands_over_host() {
    let hub = hub();
    let (a, _a_receiver) = connect(&hub);
    let (b, mut b_receiver) = connect(&hub);
    let room_id = RoomId::new("R1");
    hub.apply(|c| c.join(a, room_id.clone(), "Ada"));
    hub.apply(|c| c.join(b, room_id.clone(), "Bob"));
    drain(&mut b_receiver);

    hub.remove_peer(a).unwrap();
    let frames = drain(&mut b_receiver);
    assert_eq!(types(&frames), vec!["members-update", "chat-message"]);
    assert_eq!(frames[0]["hostId"], serde_json::to_value(b).unwrap());
    assert!(hub.remove_peer(a).is_err());
  }

  #[tokio::test]
  async fn search_replies_to_requester_only() {
    let hub = hub();
    let (a, mut a_receiver) = connect(&hub);
    let (_b, mut b_receiver) = connect(&hub);
    drain(&mut a_receiver);
    drain(&mut b_receiver);

    hub.search(a, Some("xyz_no_such_song_exists_anywhere".into())).await;
    let frames = drain(&mut a_receiver);
    assert_eq!(types(&frames), vec!["search-results"]);
    assert!(!frames[0]["items"].as_array().unwrap().is_empty());
    assert!(drain(&mut b_receiver).is_empty());

    hub.search(a, None).await;
    assert_eq!(types(&drain(&mut a_receiver)), vec!["search-error"]);
  }

  #[tokio::test]
  async fn heartbeat_flag() {
    let hub = hub();
    let (a, _receiver) = connect(&hub);
    assert!(hub.is_alive(a));
    hub.set_peer_alive(a, false).unwrap();
    assert!(!hub.is_alive(a));
    assert!(!hub.is_alive(ConnectionId::new()));
  }
}
