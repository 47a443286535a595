//! User and profile endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use folio_common::AppResult;
use folio_core::UpdateProfileInput;
use serde::Serialize;

use crate::{
    extractors::{AppJson, AuthUser},
    middleware::AppState,
    response::{UserDetailResponse, UserResponse},
};

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserResponse>,
}

/// Users the caller has no edge towards yet.
async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UsersResponse>> {
    let users = state.user_service.list_unfollowed(&user.id).await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize)]
pub struct UserDetailEnvelope {
    pub user: UserDetailResponse,
}

/// Profile page, with posts only when the caller may see them.
async fn show_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserDetailEnvelope>> {
    let detail = state.profile_service.detail(&user.id, &username).await?;
    let posts = &state.post_service;

    Ok(Json(UserDetailEnvelope {
        user: UserDetailResponse::new(detail, |a| posts.attachment_url(a)),
    }))
}

/// Profile update response.
#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Partially update the caller's profile.
async fn update_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<UpdateProfileInput>,
) -> AppResult<Json<UpdateProfileResponse>> {
    let updated = state.user_service.update_profile(&user.id, req).await?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated".to_string(),
        user: updated.into(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{username}", get(show_user))
        .route("/profile", put(update_profile))
}
