//! HTTP API.
//!
//! axum routes under `/v1` for timelines, playback control, system settings
//! and the event log, plus `/health`.

pub mod error;
pub mod extract;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
