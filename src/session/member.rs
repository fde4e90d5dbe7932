use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies one live transport connection. Not stable across reconnects.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Ulid);

impl ConnectionId {
  pub fn new() -> Self {
    Self(Ulid::new())
  }
}

impl Default for ConnectionId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.to_string().to_lowercase())
  }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
  pub id: ConnectionId,
  pub display_name: String,
}

impl Participant {
  pub(super) fn new(id: ConnectionId, display_name: impl Into<String>) -> Self {
    let display_name = display_name.into();
    let display_name = match display_name.trim() {
      "" => "Anonymous".to_owned(),
      name => name.to_owned(),
    };
    Self { id, display_name }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_names_become_anonymous() {
    assert_eq!(Participant::new(ConnectionId::new(), "  ").display_name, "Anonymous");
    assert_eq!(Participant::new(ConnectionId::new(), " Ada ").display_name, "Ada");
  }
}
