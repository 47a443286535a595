//! Authentication endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use folio_common::AppResult;
use folio_core::{LoginInput, RegisterInput};
use serde::Serialize;

use crate::{
    extractors::{AppJson, AuthUser},
    middleware::AppState,
    response::{MessageResponse, UserResponse},
};

/// Registration response.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub user: RegisteredUser,
}

/// The name fields of a freshly registered user.
#[derive(Serialize)]
pub struct RegisteredUser {
    pub full_name: String,
    pub username: String,
}

/// Create a new account.
async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.user_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Register success".to_string(),
            token: user.token.unwrap_or_default(),
            user: RegisteredUser {
                full_name: user.full_name,
                username: user.username,
            },
        }),
    ))
}

/// Login response.
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

/// Exchange credentials for a token.
async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginInput>,
) -> AppResult<Json<LoginResponse>> {
    let mut user = state.user_service.login(req).await?;
    let token = user.token.take().unwrap_or_default();

    Ok(Json(LoginResponse {
        message: "Login success".to_string(),
        token,
        user: user.into(),
    }))
}

/// Invalidate the caller's token.
async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MessageResponse>> {
    state.user_service.logout(&user.id).await?;
    Ok(Json(MessageResponse::new("Logout success")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}
