mod config;
pub mod search;
mod server;
pub mod session;

pub use self::config::Config;
pub use self::search::{SearchGateway, YouTubeProvider};
pub use self::server::Server;
pub use self::session::Coordinator;
