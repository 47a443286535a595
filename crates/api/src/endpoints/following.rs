//! Following endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use folio_common::AppResult;
use folio_core::FollowStatus;
use serde::Serialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{FollowerUserResponse, FollowingUserResponse, MessageResponse, UserResponse},
};

/// Follow result response.
#[derive(Serialize)]
pub struct FollowResponse {
    pub message: String,
    pub status: FollowStatus,
}

/// Follow a user, or request to follow a private one.
async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<FollowResponse>> {
    let target = state.user_service.get_by_username(&username).await?;
    let status = state.following_service.follow(&user.id, &target.id).await?;

    Ok(Json(FollowResponse {
        message: "Follow success".to_string(),
        status,
    }))
}

/// Remove the caller's edge towards a user, pending or accepted.
async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    let target = state.user_service.get_by_username(&username).await?;
    state.following_service.unfollow(&user.id, &target.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accept a pending follow request from a user.
async fn accept(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let follower = state.user_service.get_by_username(&username).await?;
    state.following_service.accept(&user.id, &follower.id).await?;
    Ok(Json(MessageResponse::new("Follow request accepted")))
}

#[derive(Serialize)]
pub struct FollowingListResponse {
    pub following: Vec<FollowingUserResponse>,
}

async fn get_following(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<FollowingListResponse>> {
    let entries = state.following_service.list_following(&user.id).await?;
    Ok(Json(FollowingListResponse {
        following: entries.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize)]
pub struct FollowersListResponse {
    pub followers: Vec<FollowerUserResponse>,
}

async fn get_followers(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<FollowersListResponse>> {
    let entries = state.following_service.list_followers(&user.id).await?;
    Ok(Json(FollowersListResponse {
        followers: entries.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize)]
pub struct PendingRequestsResponse {
    pub pending_requests: Vec<UserResponse>,
}

async fn get_pending_requests(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<PendingRequestsResponse>> {
    let users = state.following_service.list_pending(&user.id).await?;
    Ok(Json(PendingRequestsResponse {
        pending_requests: users.into_iter().map(Into::into).collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{username}/follow", post(follow))
        .route("/users/{username}/unfollow", delete(unfollow))
        .route("/users/{username}/accept", put(accept))
        .route("/following", get(get_following))
        .route("/followers", get(get_followers))
        .route("/pending-requests", get(get_pending_requests))
}
