use serde::Serialize;

pub const UNTITLED: &str = "Untitled";

/// A reference to an external playable item.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
  pub media_id: String,
  pub title: String,
}

impl MediaRef {
  pub fn new(media_id: impl Into<String>, title: Option<String>) -> Self {
    let title = title.filter(|title| !title.trim().is_empty()).unwrap_or_else(|| UNTITLED.into());
    Self { media_id: media_id.into(), title }
  }
}

pub type PlaylistItem = MediaRef;

/// Ordered queue of items, unique by media id.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Playlist(Vec<PlaylistItem>);

impl Playlist {
  pub fn items(&self) -> &[PlaylistItem] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, media_id: &str) -> bool {
    self.0.iter().any(|item| item.media_id == media_id)
  }

  /// Appends the item unless its media id is already queued. First title wins.
  pub fn add(&mut self, item: PlaylistItem) -> bool {
    if self.contains(&item.media_id) {
      return false;
    }
    self.0.push(item);
    true
  }

  pub fn remove(&mut self, media_id: &str) -> bool {
    let before = self.0.len();
    self.0.retain(|item| item.media_id != media_id);
    self.0.len() != before
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }
}
