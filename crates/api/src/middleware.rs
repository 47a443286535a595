//! API middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_common::AppError;
use folio_core::{FollowingService, PostService, ProfileService, UserService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub following_service: FollowingService,
    pub post_service: PostService,
    pub profile_service: ProfileService,
}

/// Bearer token from an `Authorization` header value.
fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Resolves the bearer token to a user and stores it in the request
/// extensions. Requests without a valid token pass through unauthenticated;
/// handlers that need a user reject them via [`crate::extractors::AuthUser`].
/// A failed lookup is answered directly with its error.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let user = match bearer_token(&req) {
        Some(token) => match state.user_service.authenticate_by_token(token).await {
            Ok(user) => Some(user),
            Err(AppError::Unauthorized) => None,
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
