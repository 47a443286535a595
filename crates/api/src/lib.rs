//! HTTP API layer for folio.
//!
//! - **Endpoints**: auth, posts, follow relationships, users and profile
//! - **Extractors**: authenticated user, JSON and query bodies mapped to [`folio_common::AppError`]
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8. The router is mounted under `/api/v1` by the server.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::Router;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};

/// The API routes with authentication applied and state attached.
pub fn api_router(state: AppState) -> Router {
    router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
