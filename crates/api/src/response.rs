//! API response types.

#![allow(missing_docs)]

use folio_core::{FollowStatus, FollowerEntry, FollowingEntry, PostWithAttachments, UserDetail};
use folio_db::entities::{post_attachment, user};
use serde::Serialize;

/// Response carrying only a message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub bio: Option<String>,
    pub is_private: bool,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            username: u.username,
            bio: u.bio,
            is_private: u.is_private,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// A followed user, flagged when the request is still pending.
#[derive(Debug, Serialize)]
pub struct FollowingUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub is_requested: bool,
}

impl From<FollowingEntry> for FollowingUserResponse {
    fn from(entry: FollowingEntry) -> Self {
        Self {
            user: entry.user.into(),
            is_requested: entry.is_requested,
        }
    }
}

/// A follower and whether their edge is accepted.
#[derive(Debug, Serialize)]
pub struct FollowerUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub is_accepted: bool,
}

impl From<FollowerEntry> for FollowerUserResponse {
    fn from(entry: FollowerEntry) -> Self {
        Self {
            user: entry.user.into(),
            is_accepted: entry.is_accepted,
        }
    }
}

/// A stored image attached to a post.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub storage_path: String,
    pub url: String,
    pub position: i32,
}

impl AttachmentResponse {
    pub fn new(attachment: post_attachment::Model, url: String) -> Self {
        Self {
            id: attachment.id,
            storage_path: attachment.storage_path,
            url,
            position: attachment.position,
        }
    }
}

/// A post with its author and attachments.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub caption: String,
    pub created_at: String,
    pub user: UserResponse,
    pub attachments: Vec<AttachmentResponse>,
}

impl PostResponse {
    /// Build from a hydrated post, resolving attachment URLs with `url`.
    pub fn new<F>(post: PostWithAttachments, url: F) -> Self
    where
        F: Fn(&post_attachment::Model) -> String,
    {
        let attachments = post
            .attachments
            .into_iter()
            .map(|a| {
                let link = url(&a);
                AttachmentResponse::new(a, link)
            })
            .collect();

        Self {
            id: post.post.id,
            caption: post.post.caption,
            created_at: post.post.created_at.to_rfc3339(),
            user: post.author.into(),
            attachments,
        }
    }
}

/// Profile page.
#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub follow_status: Option<FollowStatus>,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts: Vec<PostResponse>,
}

impl UserDetailResponse {
    pub fn new<F>(detail: UserDetail, url: F) -> Self
    where
        F: Fn(&post_attachment::Model) -> String,
    {
        Self {
            user: detail.user.into(),
            follow_status: detail.follow_status,
            posts_count: detail.posts_count,
            followers_count: detail.followers_count,
            following_count: detail.following_count,
            posts: detail
                .posts
                .into_iter()
                .map(|p| PostResponse::new(p, &url))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: "Alice".to_string(),
            username_lower: "alice".to_string(),
            full_name: "Alice A".to_string(),
            bio: None,
            is_private: true,
            password_hash: "secret-hash".to_string(),
            token: Some("secret-token".to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_user_response_hides_credentials() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        assert_eq!(json["username"], "Alice");
        assert_eq!(json["is_private"], true);
        assert!(json.get("password_hash").is_none());
        assert!(json.get("token").is_none());
    }

    #[test]
    fn test_following_entry_is_flattened() {
        let json = serde_json::to_value(FollowingUserResponse::from(FollowingEntry {
            user: sample_user(),
            is_requested: true,
        }))
        .unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["is_requested"], true);
    }

    #[test]
    fn test_detail_without_status_serializes_null() {
        let detail = UserDetail {
            user: sample_user(),
            follow_status: None,
            posts_count: 0,
            followers_count: 0,
            following_count: 0,
            posts: vec![],
        };
        let json = serde_json::to_value(UserDetailResponse::new(detail, |_| String::new())).unwrap();
        assert!(json["follow_status"].is_null());
        assert_eq!(json["posts"], serde_json::json!([]));
    }
}
