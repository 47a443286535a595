//! API endpoints.

#![allow(missing_docs)]

mod auth;
mod following;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .merge(posts::router())
        .merge(following::router())
        .merge(users::router())
}
