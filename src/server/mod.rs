mod api_error;
mod chat_routes;
pub mod config;
mod http_layers;
mod search_routes;
pub mod server;
pub mod state;
mod video_routes;

pub use api_error::{ApiError, ErrorResponse};
pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
