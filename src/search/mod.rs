//! Best-effort video search.
//!
//! [`SearchGateway`] wraps an external [`SearchProvider`] with a timeout and
//! degrades to an embedded catalog whenever the provider is missing, slow,
//! failing or empty. Only a blank query is reported back as an error.

mod fallback;
mod youtube;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use self::fallback::{fallback, FALLBACK_LIMIT};
pub use self::youtube::YouTubeProvider;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
  #[error("no search query provided")]
  EmptyQuery,

  #[error("search timed out after {0:?}")]
  Timeout(Duration),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("search provider error: {0}")]
  Provider(String),
}

/// A playable search result.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MediaItem {
  pub id: String,
  pub title: String,
  pub thumbnail: String,
  pub duration: String,
}

impl MediaItem {
  pub fn thumbnail_for(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/mqdefault.jpg")
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitKind {
  Video,
  Channel,
  Playlist,
  Other,
}

/// A raw provider result, before filtering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
  pub kind: HitKind,
  pub id: String,
  pub title: String,
  pub thumbnail: Option<String>,
  pub duration: Option<String>,
}

impl SearchHit {
  fn into_playable(self) -> Option<MediaItem> {
    if self.kind != HitKind::Video || self.id.is_empty() || self.title.is_empty() {
      return None;
    }
    let thumbnail = self.thumbnail.unwrap_or_else(|| MediaItem::thumbnail_for(&self.id));
    Some(MediaItem {
      id: self.id,
      title: self.title,
      thumbnail,
      duration: self.duration.unwrap_or_default(),
    })
  }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

#[derive(Clone)]
pub struct SearchGateway {
  provider: Option<Arc<dyn SearchProvider>>,
  timeout: Duration,
}

impl SearchGateway {
  pub fn new(provider: Arc<dyn SearchProvider>, timeout: Duration) -> Self {
    Self { provider: Some(provider), timeout }
  }

  /// A gateway that always answers from the embedded catalog.
  pub fn offline() -> Self {
    Self { provider: None, timeout: Duration::ZERO }
  }

  pub async fn search(&self, query: &str) -> Result<Vec<MediaItem>> {
    let query = query.trim();
    if query.is_empty() {
      return Err(SearchError::EmptyQuery);
    }

    match self.search_provider(query).await {
      Ok(items) if !items.is_empty() => {
        debug!("search query={query} results={}", items.len());
        Ok(items)
      }
      Ok(_) => {
        info!("no playable results, using fallback query={query}");
        Ok(fallback(query))
      }
      Err(e) => {
        warn!("search failed, using fallback query={query}: {e}");
        Ok(fallback(query))
      }
    }
  }

  async fn search_provider(&self, query: &str) -> Result<Vec<MediaItem>> {
    let Some(provider) = &self.provider else {
      return Ok(Vec::new());
    };

    let hits = tokio::time::timeout(self.timeout, provider.search(query))
      .await
      .map_err(|_| SearchError::Timeout(self.timeout))??;

    Ok(hits.into_iter().filter_map(SearchHit::into_playable).collect())
  }
}

impl std::fmt::Debug for SearchGateway {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SearchGateway")
      .field("provider", &self.provider.is_some())
      .field("timeout", &self.timeout)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  enum Stub {
    Hits(Vec<SearchHit>),
    Fail,
    Hang,
  }

  #[async_trait]
  impl SearchProvider for Stub {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
      match self {
        Stub::Hits(hits) => Ok(hits.clone()),
        Stub::Fail => Err(SearchError::Provider("boom".into())),
        Stub::Hang => {
          tokio::time::sleep(Duration::from_secs(3600)).await;
          Ok(Vec::new())
        }
      }
    }
  }

  fn gateway(stub: Stub) -> SearchGateway {
    SearchGateway::new(Arc::new(stub), Duration::from_secs(10))
  }

  fn hit(kind: HitKind, id: &str, title: &str) -> SearchHit {
    SearchHit { kind, id: id.into(), title: title.into(), thumbnail: None, duration: None }
  }

  #[tokio::test]
  async fn only_playable_results_are_returned() {
    let gateway = gateway(Stub::Hits(vec![
      hit(HitKind::Channel, "chan", "A channel"),
      hit(HitKind::Video, "abc12345678", "A video"),
      hit(HitKind::Video, "", "No id"),
      hit(HitKind::Playlist, "list", "A playlist"),
    ]));

    let items = gateway.search("video").await.unwrap();
    assert_eq!(
      items,
      vec![MediaItem {
        id: "abc12345678".into(),
        title: "A video".into(),
        thumbnail: MediaItem::thumbnail_for("abc12345678"),
        duration: String::new(),
      }]
    );
  }

  #[tokio::test]
  async fn empty_provider_result_falls_back() {
    let items = gateway(Stub::Hits(vec![])).search("xyz_no_such_song_exists_anywhere").await;
    assert_eq!(items.unwrap().len(), FALLBACK_LIMIT);
  }

  #[tokio::test]
  async fn provider_failure_falls_back_to_matches() {
    let items = gateway(Stub::Fail).search("despacito").await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].title.contains("Despacito"));
  }

  #[tokio::test(start_paused = true)]
  async fn slow_provider_times_out() {
    let items = gateway(Stub::Hang).search("weeknd").await.unwrap();
    assert!(items[0].title.contains("Blinding Lights"));
  }

  #[tokio::test]
  async fn blank_query_is_rejected() {
    assert!(matches!(SearchGateway::offline().search("  ").await, Err(SearchError::EmptyQuery)));
    assert!(!SearchGateway::offline().search("drake").await.unwrap().is_empty());
  }
}
