use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use watchparty::{Config, Coordinator, SearchGateway, Server, YouTubeProvider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Server port
  #[arg(short, long, env, default_value_t = 3001, value_parser = clap::value_parser!(u16).range(1025..))]
  port: u16,

  /// Origins allowed to connect, any origin when omitted
  #[arg(long = "allowed-origin", env = "ALLOWED_ORIGIN", value_delimiter = ',')]
  allowed_origins: Vec<String>,

  /// YouTube Data API key, search only uses the built-in catalog without it
  #[arg(long, env)]
  youtube_api_key: Option<String>,

  /// Seconds before a search falls back to the built-in catalog
  #[arg(long, env, default_value_t = 10)]
  search_timeout_secs: u64,

  /// Only let the host control playback and the playlist
  #[arg(long, env)]
  host_controls: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let default_level = if cfg!(not(debug_assertions)) { Level::INFO } else { Level::DEBUG };
  let filter = EnvFilter::builder()
    .with_default_directive(default_level.into())
    .from_env_lossy()
    .add_directive("hyper=off".parse()?)
    .add_directive("tungstenite=off".parse()?);

  if cfg!(not(debug_assertions)) {
    tracing_subscriber::fmt().with_env_filter(filter).init();
  } else {
    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
  }

  let args = Args::parse();

  let search = match args.youtube_api_key {
    Some(api_key) => SearchGateway::new(
      Arc::new(YouTubeProvider::new(api_key)),
      Duration::from_secs(args.search_timeout_secs),
    ),
    None => {
      info!("no youtube api key, search answers from the built-in catalog");
      SearchGateway::offline()
    }
  };

  let coordinator = Coordinator::new(Config::default().with_host_controls(args.host_controls));
  let server =
    Server::new(args.port, coordinator, search).with_allowed_origins(args.allowed_origins);
  server.listen().await
}
