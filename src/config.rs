use std::time::Duration;

/// Tunable parameters of the room coordinator.
#[derive(Clone, Debug)]
pub struct Config {
  /// Probability that a periodic time report is re-broadcast to the whole room.
  pub timestamp_sample_rate: f64,
  /// Delay between a `play` and the follow-up `timestamp` at position 0.
  pub settle_delay: Duration,
  /// How long a position reported during playback is trusted as current.
  pub position_freshness: Duration,
  /// How long a typing indicator survives without being refreshed.
  pub typing_ttl: Duration,
  /// How long a created room may stay without members before it is dropped.
  pub vacant_room_ttl: Duration,
  /// Period of the expiry sweep.
  pub sweep_interval: Duration,
  /// Period of transport level pings.
  pub heartbeat_interval: Duration,
  /// Restrict playback and playlist control to the host.
  pub host_controls: bool,
}

impl Config {
  pub fn with_host_controls(mut self, host_controls: bool) -> Self {
    self.host_controls = host_controls;
    self
  }

  pub fn with_timestamp_sample_rate(mut self, rate: f64) -> Self {
    self.timestamp_sample_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timestamp_sample_rate: 0.05,
      settle_delay: Duration::from_secs(2),
      position_freshness: Duration::from_secs(5),
      typing_ttl: Duration::from_secs(6),
      vacant_room_ttl: Duration::from_secs(60),
      sweep_interval: Duration::from_secs(1),
      heartbeat_interval: Duration::from_millis(10_000),
      host_controls: false,
    }
  }
}
