use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{HitKind, Result, SearchError, SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: u8 = 20;

/// Searches through the YouTube Data API.
#[derive(Clone, Debug)]
pub struct YouTubeProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
}

impl YouTubeProvider {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self::with_base_url(api_key, DEFAULT_BASE_URL)
  }

  pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: base_url.into() }
  }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
  #[serde(default)]
  items: Vec<ResponseItem>,
}

#[derive(Debug, Deserialize)]
struct ResponseItem {
  id: ResourceId,
  snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
  kind: String,
  video_id: Option<String>,
  channel_id: Option<String>,
  playlist_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
  #[serde(default)]
  title: String,
  #[serde(default)]
  thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
  high: Option<Thumbnail>,
  medium: Option<Thumbnail>,
  default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
  url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
  #[serde(default)]
  items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
  id: String,
  content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
  duration: String,
}

/// Formats an ISO 8601 duration (`PT1H2M3S`) as `1:02:03`. Zero-length
/// durations, as reported for live streams, yield nothing.
fn format_duration(iso: &str) -> Option<String> {
  let rest = iso.strip_prefix('P')?;
  let (date, time) = rest.split_once('T').unwrap_or((rest, ""));
  let total = sum_units(date, &[('W', 604_800), ('D', 86_400)])?
    + sum_units(time, &[('H', 3_600), ('M', 60), ('S', 1)])?;
  if total == 0 {
    return None;
  }

  let (hours, minutes, seconds) = (total / 3_600, total % 3_600 / 60, total % 60);
  if hours > 0 {
    Some(format!("{hours}:{minutes:02}:{seconds:02}"))
  } else {
    Some(format!("{minutes}:{seconds:02}"))
  }
}

fn sum_units(part: &str, units: &[(char, u64)]) -> Option<u64> {
  let mut total = 0;
  let mut digits = String::new();
  for c in part.chars() {
    if c.is_ascii_digit() {
      digits.push(c);
      continue;
    }
    let (_, scale) = units.iter().find(|(unit, _)| *unit == c)?;
    total += digits.parse::<u64>().ok()? * scale;
    digits.clear();
  }
  digits.is_empty().then_some(total)
}

impl From<ResponseItem> for SearchHit {
  fn from(item: ResponseItem) -> Self {
    let ResourceId { kind, video_id, channel_id, playlist_id } = item.id;
    let (kind, id) = match kind.as_str() {
      "youtube#video" => (HitKind::Video, video_id),
      "youtube#channel" => (HitKind::Channel, channel_id),
      "youtube#playlist" => (HitKind::Playlist, playlist_id),
      _ => (HitKind::Other, None),
    };
    let (title, thumbnail) = match item.snippet {
      Some(Snippet { title, thumbnails }) => {
        let thumbnail = thumbnails.high.or(thumbnails.medium).or(thumbnails.default);
        (title, thumbnail.map(|thumbnail| thumbnail.url))
      }
      None => (String::new(), None),
    };

    SearchHit { kind, id: id.unwrap_or_default(), title, thumbnail, duration: None }
  }
}

impl YouTubeProvider {
  async fn get<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, &str)]) -> Result<T> {
    let url = format!("{}/{resource}", self.base_url);
    let response = self
      .client
      .get(url)
      .query(query)
      .query(&[("key", self.api_key.as_str())])
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(SearchError::Provider(format!("youtube answered {status} for {resource}")));
    }
    Ok(response.json().await?)
  }

  /// Video durations by id. Search results do not carry them.
  async fn durations(&self, ids: &[&str]) -> Result<HashMap<String, String>> {
    let ids = ids.join(",");
    let response: VideosResponse =
      self.get("videos", &[("part", "contentDetails"), ("id", ids.as_str())]).await?;

    Ok(
      response
        .items
        .into_iter()
        .filter_map(|item| {
          let duration = format_duration(&item.content_details?.duration)?;
          Some((item.id, duration))
        })
        .collect(),
    )
  }
}

#[async_trait]
impl SearchProvider for YouTubeProvider {
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
    let max_results = MAX_RESULTS.to_string();
    let params = [
      ("part", "snippet"),
      ("type", "video"),
      ("maxResults", max_results.as_str()),
      ("q", query),
    ];
    let response: SearchResponse = self.get("search", &params).await?;
    debug!("youtube returned {} items", response.items.len());

    let mut hits: Vec<SearchHit> = response.items.into_iter().map(SearchHit::from).collect();
    let ids: Vec<&str> = hits
      .iter()
      .filter(|hit| hit.kind == HitKind::Video && !hit.id.is_empty())
      .map(|hit| hit.id.as_str())
      .collect();
    if ids.is_empty() {
      return Ok(hits);
    }

    match self.durations(&ids).await {
      Ok(mut durations) => {
        for hit in &mut hits {
          hit.duration = durations.remove(&hit.id);
        }
      }
      Err(e) => warn!("cannot look up durations: {e}"),
    }
    Ok(hits)
  }
}

#[cfg(test)]
mod tests {
  use std::net::TcpListener;

  use axum::extract::Query;
  use axum::http::StatusCode;
  use axum::routing::get;
  use axum::{Json, Router};
  use serde_json::{json, Value};

  use super::*;

  #[test]
  fn maps_response_items() {
    let response: SearchResponse = serde_json::from_value(json!({
      "items": [
        {
          "id": { "kind": "youtube#video", "videoId": "abc12345678" },
          "snippet": {
            "title": "Song",
            "thumbnails": { "default": { "url": "d.jpg" }, "medium": { "url": "m.jpg" } }
          }
        },
        { "id": { "kind": "youtube#channel", "channelId": "UC1" }, "snippet": { "title": "Chan" } },
        { "id": { "kind": "youtube#video", "videoId": "noSnippet00" } }
      ]
    }))
    .unwrap();

    let hits: Vec<SearchHit> = response.items.into_iter().map(SearchHit::from).collect();
    assert_eq!(
      hits[0],
      SearchHit {
        kind: HitKind::Video,
        id: "abc12345678".into(),
        title: "Song".into(),
        thumbnail: Some("m.jpg".into()),
        duration: None,
      }
    );
    assert_eq!(hits[1].kind, HitKind::Channel);
    assert_eq!(hits[2].title, "");
  }

  #[test]
  fn formats_durations() {
    assert_eq!(format_duration("PT4M13S").as_deref(), Some("4:13"));
    assert_eq!(format_duration("PT45S").as_deref(), Some("0:45"));
    assert_eq!(format_duration("PT1H2M3S").as_deref(), Some("1:02:03"));
    assert_eq!(format_duration("PT2H").as_deref(), Some("2:00:00"));
    assert_eq!(format_duration("P1DT1M").as_deref(), Some("24:01:00"));
    assert_eq!(format_duration("P0D"), None);
    assert_eq!(format_duration("PT1.5S"), None);
    assert_eq!(format_duration("4:13"), None);
  }

  async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::Server::from_tcp(listener).unwrap().serve(app.into_make_service()));
    format!("http://{addr}")
  }

  fn search_results() -> Json<Value> {
    Json(json!({
      "items": [
        {
          "id": { "kind": "youtube#video", "videoId": "abc12345678" },
          "snippet": { "title": "Song", "thumbnails": { "high": { "url": "h.jpg" } } }
        },
        {
          "id": { "kind": "youtube#video", "videoId": "live0000000" },
          "snippet": { "title": "Live" }
        }
      ]
    }))
  }

  #[tokio::test]
  async fn search_fills_in_durations() {
    let app = Router::new().route("/search", get(|| async { search_results() })).route(
      "/videos",
      get(|Query(params): Query<HashMap<String, String>>| async move {
        assert_eq!(params["part"], "contentDetails");
        assert_eq!(params["id"], "abc12345678,live0000000");
        Json(json!({
          "items": [
            { "id": "abc12345678", "contentDetails": { "duration": "PT3M20S" } },
            { "id": "live0000000", "contentDetails": { "duration": "P0D" } }
          ]
        }))
      }),
    );
    let provider = YouTubeProvider::with_base_url("key", serve(app).await);

    let hits = provider.search("song").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].duration.as_deref(), Some("3:20"));
    assert_eq!(hits[0].thumbnail.as_deref(), Some("h.jpg"));
    assert_eq!(hits[1].duration, None);
  }

  #[tokio::test]
  async fn failed_duration_lookup_keeps_results() {
    let app = Router::new()
      .route("/search", get(|| async { search_results() }))
      .route("/videos", get(|| async { StatusCode::FORBIDDEN }));
    let provider = YouTubeProvider::with_base_url("key", serve(app).await);

    let hits = provider.search("song").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| hit.duration.is_none()));
  }

  #[tokio::test]
  async fn rejected_search_is_a_provider_error() {
    let app = Router::new().route("/search", get(|| async { StatusCode::FORBIDDEN }));
    let provider = YouTubeProvider::with_base_url("key", serve(app).await);
    assert!(matches!(provider.search("song").await, Err(SearchError::Provider(_))));
  }
}
