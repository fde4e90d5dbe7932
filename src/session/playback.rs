//! Authoritative playback state of a room.
//!
//! There is no server side clock: the position is always a snapshot taken from
//! the last play, seek, end or client report. A snapshot is trusted only if it
//! was younger than the configured freshness window when playback last
//! advanced: now while playing, the moment of pausing while paused. Anything
//! older is treated as unknown so that late joiners ask their peers instead of
//! jumping to a stale offset.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::playlist::MediaRef;

/// Title used when a peer reports an item the room has never seen.
pub const UNKNOWN_TRACK: &str = "Unknown Track";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackState {
  Idle,
  LoadedPaused,
  LoadedPlaying,
}

/// A position report as sent on the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamp {
  pub media_id: String,
  pub seconds: f64,
  pub playing: bool,
}

#[derive(Clone, Debug)]
pub struct Playback {
  current: Option<MediaRef>,
  playing: bool,
  position: f64,
  // last position update
  updated_at: Instant,
  // when playback last stopped advancing
  stopped_at: Instant,
}

impl Default for Playback {
  fn default() -> Self {
    let now = Instant::now();
    Self { current: None, playing: false, position: 0.0, updated_at: now, stopped_at: now }
  }
}

/// Negative and non-finite offsets from the wire are treated as 0.
pub fn clamp_seconds(seconds: f64) -> f64 {
  if seconds.is_finite() && seconds > 0.0 {
    seconds
  } else {
    0.0
  }
}

impl Playback {
  pub fn state(&self) -> PlaybackState {
    match (&self.current, self.playing) {
      (None, _) => PlaybackState::Idle,
      (Some(_), false) => PlaybackState::LoadedPaused,
      (Some(_), true) => PlaybackState::LoadedPlaying,
    }
  }

  pub fn current(&self) -> Option<&MediaRef> {
    self.current.as_ref()
  }

  pub fn is_current(&self, media_id: &str) -> bool {
    self.current.as_ref().map(|item| item.media_id == media_id).unwrap_or(false)
  }

  pub fn is_playing(&self) -> bool {
    self.playing
  }

  pub fn position(&self) -> f64 {
    self.position
  }

  /// Loads an item and starts it from the beginning.
  pub fn play(&mut self, item: MediaRef, now: Instant) {
    self.current = Some(item);
    self.playing = true;
    self.set_position(0.0, now);
  }

  pub fn pause(&mut self, now: Instant) {
    if self.playing {
      self.playing = false;
      self.stopped_at = now;
    }
  }

  /// Restarts the loaded item. The position keeps the age it had when paused.
  pub fn resume(&mut self, now: Instant) {
    if self.playing || self.current.is_none() {
      return;
    }
    let age = self.stopped_at.saturating_duration_since(self.updated_at);
    self.updated_at = now.checked_sub(age).unwrap_or(self.updated_at);
    self.playing = true;
  }

  pub fn seek(&mut self, seconds: f64, now: Instant) -> f64 {
    self.set_position(seconds, now)
  }

  /// Records a periodic report. Reports for anything but the current item are ignored.
  pub fn report(&mut self, media_id: &str, seconds: f64, now: Instant) -> bool {
    if !self.is_current(media_id) {
      return false;
    }
    self.set_position(seconds, now);
    true
  }

  /// Takes a peer's full playback view as authoritative. `item` replaces the
  /// current item when given. Without an item there is nothing to position
  /// while idle, so the view is ignored.
  pub fn submit(
    &mut self,
    item: Option<MediaRef>,
    seconds: f64,
    playing: bool,
    now: Instant,
  ) -> bool {
    match item {
      Some(item) if !self.is_current(&item.media_id) => self.current = Some(item),
      Some(_) => {}
      None if self.current.is_none() => return false,
      None => {}
    }
    self.playing = playing;
    self.set_position(seconds, now);
    true
  }

  /// The item ran out: fold back to paused at the start.
  pub fn end(&mut self, now: Instant) {
    self.playing = false;
    self.set_position(0.0, now);
  }

  /// Position that can be handed out as current, if any.
  pub fn known_position(&self, now: Instant, freshness: Duration) -> Option<f64> {
    self.current.as_ref()?;
    let until = if self.playing { now } else { self.stopped_at };
    (until.saturating_duration_since(self.updated_at) <= freshness).then_some(self.position)
  }

  pub fn timestamp(&self) -> Option<Timestamp> {
    self.current.as_ref().map(|item| Timestamp {
      media_id: item.media_id.clone(),
      seconds: self.position,
      playing: self.playing,
    })
  }

  fn set_position(&mut self, seconds: f64, now: Instant) -> f64 {
    self.position = clamp_seconds(seconds);
    self.updated_at = now;
    if !self.playing {
      self.stopped_at = now;
    }
    self.position
  }
}
