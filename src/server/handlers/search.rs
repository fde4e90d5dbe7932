use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
  q: Option<String>,
}

pub(crate) async fn search(
  State(state): State<ServerState>,
  Query(params): Query<SearchParams>,
) -> Response {
  let query = params.q.unwrap_or_default();
  info!("http search query={query}");

  match state.hub.search_gateway().search(&query).await {
    Ok(results) => Json(json!({ "results": results })).into_response(),
    Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
  }
}

#[cfg(test)]
mod tests {
  use axum::body::HttpBody;
  use serde_json::Value;

  use super::*;
  use crate::search::SearchGateway;
  use crate::server::hub::Hub;
  use crate::session::Coordinator;
  use crate::Config;

  fn state() -> ServerState {
    ServerState::new(Hub::new(Coordinator::new(Config::default()), SearchGateway::offline()))
  }

  async fn body_json(response: Response) -> Value {
    let mut body = response.into_body();
    let bytes = body.data().await.unwrap().unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn blank_query_is_a_bad_request() {
    let response = search(State(state()), Query(SearchParams { q: Some(" ".into()) })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
  }

  #[tokio::test]
  async fn query_returns_results() {
    let response = search(State(state()), Query(SearchParams { q: Some("drake".into()) })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"][0]["title"], "Drake - God's Plan");
  }
}
