//! HTTP surface of the auto-shorts job server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use logging::JsonLineFormatter;
pub use routes::create_router;
pub use state::AppState;
