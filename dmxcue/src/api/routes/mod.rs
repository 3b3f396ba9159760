//! API route modules.
//!
//! Organizes routes by resource type.

pub mod events;
pub mod health;
pub mod logging;
pub mod system;
pub mod timelines;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/v1/timelines", timelines::router())
        .nest("/v1/system", system::router().merge(logging::router()))
        .nest("/v1/events", events::router())
        .nest("/health", health::router())
        .with_state(state)
}
