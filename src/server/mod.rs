mod event;
mod handlers;
mod hub;
mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{error, info, warn, Level};

use crate::search::SearchGateway;
use crate::session::Coordinator;

pub use self::hub::Hub;
use self::state::ServerState;

pub struct Server {
  port: u16,
  allowed_origins: Vec<String>,
  hub: Hub,
}

impl Server {
  pub fn new(port: u16, coordinator: Coordinator, search: SearchGateway) -> Self {
    Self { port, allowed_origins: Vec::new(), hub: Hub::new(coordinator, search) }
  }

  /// Restricts cross-origin requests to these origins. Empty allows any origin.
  pub fn with_allowed_origins(mut self, allowed_origins: Vec<String>) -> Self {
    self.allowed_origins = allowed_origins;
    self
  }

  pub async fn listen(self) -> Result<()> {
    let hub = self.hub.clone();
    tokio::spawn(async move {
      if let Err(e) = hub.run().await {
        error!("sweeper stopped: {e}");
      }
    });

    let state = ServerState::new(self.hub);
    let app = Router::new()
      .route("/", get(handlers::socket))
      .route("/info", get(handlers::info))
      .route("/test", get(handlers::test))
      .route("/search", get(handlers::search))
      .layer(cors(&self.allowed_origins)?)
      .layer(trace())
      .with_state(state);

    info!("starting server: {}", self.port);
    let addr = SocketAddr::new([0, 0, 0, 0].into(), self.port);
    axum::Server::bind(&addr)
      .serve(app.into_make_service_with_connect_info::<SocketAddr>())
      .with_graceful_shutdown(shutdown_signal())
      .await?;

    info!("server shut down");
    Ok(())
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("cannot listen for shutdown signal: {e}");
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}

fn cors(allowed_origins: &[String]) -> Result<CorsLayer> {
  let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
  if allowed_origins.is_empty() {
    if cfg!(not(debug_assertions)) {
      warn!("no allowed origin configured, accepting any origin");
    }
    return Ok(cors.allow_origin(Any));
  }

  let origins = allowed_origins
    .iter()
    .map(|origin| origin.parse::<HeaderValue>().with_context(|| format!("invalid origin {origin}")))
    .collect::<Result<Vec<_>>>()?;
  info!("accepting connections from {allowed_origins:?}");
  Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

fn trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
  TraceLayer::new_for_http()
    .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Micros))
}
