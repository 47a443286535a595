//! Post endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use folio_common::AppResult;
use folio_core::{AttachmentUpload, CreatePostInput, FeedQuery};
use serde::Serialize;

use crate::{
    extractors::{AppQuery, AuthUser},
    middleware::AppState,
    response::{AttachmentResponse, PostResponse},
};

/// Post creation response.
#[derive(Serialize)]
pub struct CreatePostResponse {
    pub message: String,
    pub post: PostResponse,
    pub attachments: Vec<AttachmentResponse>,
}

/// Read the `caption` and `post_attachments[]` fields of a multipart form.
async fn read_post_form(mut multipart: Multipart) -> AppResult<CreatePostInput> {
    let mut caption = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "caption" => {
                caption = Some(field.text().await?);
            }
            "post_attachments[]" | "post_attachments" => {
                let file_name = field
                    .file_name()
                    .map_or_else(|| "upload".to_string(), ToString::to_string);
                let data = field.bytes().await?.to_vec();
                attachments.push(AttachmentUpload { file_name, data });
            }
            _ => {
                tracing::debug!(field = %name, "Ignoring unknown form field");
            }
        }
    }

    Ok(CreatePostInput {
        caption,
        attachments,
    })
}

/// Create a post with one or more images.
async fn create_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CreatePostResponse>)> {
    let input = read_post_form(multipart).await?;
    let created = state.post_service.create(&user, input).await?;

    let posts = &state.post_service;
    let post = PostResponse::new(created, |a| posts.attachment_url(a));
    let attachments = post.attachments.clone();

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Create post success".to_string(),
            post,
            attachments,
        }),
    ))
}

/// Feed page response.
#[derive(Serialize)]
pub struct FeedResponse {
    pub page: i64,
    pub size: i64,
    pub posts: Vec<PostResponse>,
}

/// Newest posts the caller may see.
async fn feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FeedQuery>,
) -> AppResult<Json<FeedResponse>> {
    let posts = state.post_service.feed(&user.id, &query).await?;
    let service = &state.post_service;

    Ok(Json(FeedResponse {
        page: query.page,
        size: query.size,
        posts: posts
            .into_iter()
            .map(|p| PostResponse::new(p, |a| service.attachment_url(a)))
            .collect(),
    }))
}

/// Soft-delete one of the caller's posts.
async fn delete_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.post_service.delete(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(feed).post(create_post))
        .route("/posts/{id}", delete(delete_post))
}
