//! Post service.

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::visibility::VisibilityService;
use chrono::Utc;
use folio_common::{AppError, AppResult, IdGenerator, StorageBackend, generate_storage_key};
use folio_db::{
    entities::{post, post_attachment, user},
    repositories::{PostRepository, UserRepository},
};
use futures::future::join_all;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Image types accepted as attachments.
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// An uploaded file, as received from the client.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub caption: Option<String>,
    pub attachments: Vec<AttachmentUpload>,
}

/// Feed pagination.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedQuery {
    #[serde(default)]
    #[validate(range(min = 0, message = "The page must be at least 0."))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 10, message = "The size must be between 1 and 10."))]
    pub size: i64,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_page_size(),
        }
    }
}

const fn default_page_size() -> i64 {
    10
}

/// A post with its owner and ordered attachments.
#[derive(Debug, Clone)]
pub struct PostWithAttachments {
    pub post: post::Model,
    pub author: user::Model,
    pub attachments: Vec<post_attachment::Model>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    visibility: VisibilityService,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

/// Detect an allowed image type from the file's leading bytes.
#[must_use]
pub fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

impl CreatePostInput {
    /// Validate caption and attachments, returning the detected content types.
    fn validate(&self) -> AppResult<Vec<&'static str>> {
        let mut errors = validator::ValidationErrors::new();

        if self.caption.as_deref().is_none_or(|c| c.trim().is_empty()) {
            let mut error = validator::ValidationError::new("required");
            error.message = Some("The caption field is required.".into());
            errors.add("caption", error);
        }

        let mut types = Vec::with_capacity(self.attachments.len());
        if self.attachments.is_empty() {
            let mut error = validator::ValidationError::new("required");
            error.message = Some("The post attachments field is required.".into());
            errors.add("post_attachments", error);
        }
        for (index, upload) in self.attachments.iter().enumerate() {
            match sniff_image_type(&upload.data) {
                Some(content_type) => types.push(content_type),
                None => {
                    let mut error = validator::ValidationError::new("mimetypes");
                    error.message = Some(
                        format!(
                            "The post_attachments.{index} must be a file of type: {}.",
                            ALLOWED_CONTENT_TYPES.join(", ")
                        )
                        .into(),
                    );
                    errors.add("post_attachments", error);
                }
            }
        }

        if errors.is_empty() {
            Ok(types)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        user_repo: UserRepository,
        visibility: VisibilityService,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            visibility,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Public URL of an attachment.
    #[must_use]
    pub fn attachment_url(&self, attachment: &post_attachment::Model) -> String {
        self.storage.public_url(&attachment.storage_path)
    }

    /// Create a post with its attachments.
    ///
    /// Blobs are written first. If any write or the database insert fails,
    /// the blobs already written are removed.
    pub async fn create(&self, owner: &user::Model, input: CreatePostInput) -> AppResult<PostWithAttachments> {
        let content_types = input.validate()?;
        let caption = input.caption.unwrap_or_default();

        let mut stored_keys = Vec::with_capacity(input.attachments.len());
        for (upload, content_type) in input.attachments.iter().zip(content_types) {
            let key = generate_storage_key(&owner.id, &upload.file_name);
            if let Err(e) = self.storage.put(&key, &upload.data, content_type).await {
                self.remove_blobs(&stored_keys).await;
                return Err(e);
            }
            stored_keys.push(key);
        }

        let now = Utc::now();
        let post_id = self.id_gen.generate();
        let attachments: Vec<post_attachment::Model> = stored_keys
            .iter()
            .enumerate()
            .map(|(position, key)| post_attachment::Model {
                id: self.id_gen.generate(),
                post_id: post_id.clone(),
                storage_path: key.clone(),
                position: position as i32,
                created_at: now.into(),
            })
            .collect();

        let model = post::ActiveModel {
            id: Set(post_id),
            user_id: Set(owner.id.clone()),
            caption: Set(caption),
            created_at: Set(now.into()),
            updated_at: Set(None),
            deleted_at: Set(None),
        };

        let post = match self
            .post_repo
            .create_with_attachments(model, &attachments)
            .await
        {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(user_id = %owner.id, blobs = stored_keys.len(), "Post insert failed, removing stored blobs");
                self.remove_blobs(&stored_keys).await;
                return Err(e);
            }
        };

        tracing::info!(user_id = %owner.id, post_id = %post.id, attachments = attachments.len(), "Post created");

        Ok(PostWithAttachments {
            post,
            author: owner.clone(),
            attachments,
        })
    }

    /// Global feed, newest first, limited to posts the viewer may see.
    pub async fn feed(&self, viewer_id: &str, query: &FeedQuery) -> AppResult<Vec<PostWithAttachments>> {
        query.validate()?;

        // Both are non-negative once validated, so the product fits in u64.
        let offset = query
            .page
            .checked_mul(query.size)
            .ok_or_else(|| AppError::field("page", "range", "The page is too large."))?;

        let scope = self.visibility.feed_scope(viewer_id).await?;
        let posts = self
            .post_repo
            .find_page(scope.condition(), query.size as u64, offset as u64)
            .await?;
        self.hydrate(posts).await
    }

    /// A user's posts, newest first. Empty when the viewer may not see them.
    pub async fn list_for_user(
        &self,
        viewer_id: &str,
        owner: &user::Model,
    ) -> AppResult<Vec<PostWithAttachments>> {
        if !self.visibility.can_view(viewer_id, owner).await? {
            return Ok(vec![]);
        }
        self.list_by_owner(owner).await
    }

    async fn list_by_owner(&self, owner: &user::Model) -> AppResult<Vec<PostWithAttachments>> {
        let posts = self.post_repo.find_by_user(&owner.id).await?;
        let attachments = self.attachments_by_post(&posts).await?;

        Ok(posts
            .into_iter()
            .map(|post| PostWithAttachments {
                attachments: attachments.get(&post.id).cloned().unwrap_or_default(),
                author: owner.clone(),
                post,
            })
            .collect())
    }

    /// Count a user's live posts.
    pub async fn count_for_user(&self, user_id: &str) -> AppResult<u64> {
        self.post_repo.count_by_user(user_id).await
    }

    /// Soft-delete a post. Only the owner may delete it.
    pub async fn delete(&self, user_id: &str, post_id: &str) -> AppResult<()> {
        let post = self
            .post_repo
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if post.user_id != user_id {
            return Err(AppError::Forbidden("Forbidden access".to_string()));
        }

        if !self.post_repo.soft_delete(post_id).await? {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        tracing::info!(user_id = %user_id, post_id = %post_id, "Post deleted");
        Ok(())
    }

    async fn hydrate(&self, posts: Vec<post::Model>) -> AppResult<Vec<PostWithAttachments>> {
        let mut owner_ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
        owner_ids.sort();
        owner_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&owner_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let attachments = self.attachments_by_post(&posts).await?;

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let author = authors.get(&post.user_id)?.clone();
                Some(PostWithAttachments {
                    attachments: attachments.get(&post.id).cloned().unwrap_or_default(),
                    author,
                    post,
                })
            })
            .collect())
    }

    async fn attachments_by_post(
        &self,
        posts: &[post::Model],
    ) -> AppResult<HashMap<String, Vec<post_attachment::Model>>> {
        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let mut grouped: HashMap<String, Vec<post_attachment::Model>> = HashMap::new();
        for attachment in self.post_repo.find_attachments(&ids).await? {
            grouped
                .entry(attachment.post_id.clone())
                .or_default()
                .push(attachment);
        }
        Ok(grouped)
    }

    async fn remove_blobs(&self, keys: &[String]) {
        let results = join_all(keys.iter().map(|key| self.storage.delete(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "Possible leaked blob");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use folio_common::NoOpStorage;
    use folio_db::{entities::following, repositories::FollowingRepository};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Mutex;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    /// Storage that records writes and deletes.
    #[derive(Default)]
    struct RecordingStorage {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl StorageBackend for RecordingStorage {
        async fn put(&self, key: &str, _data: &[u8], _content_type: &str) -> AppResult<()> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("/storage/{key}")
        }
    }

    fn create_test_user(id: &str, is_private: bool) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_string(),
            full_name: id.to_string(),
            bio: None,
            is_private,
            password_hash: "hash".to_string(),
            token: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_post(id: &str, user_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            caption: "hello".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn service(
        post_db: MockDatabase,
        user_db: MockDatabase,
        following_db: MockDatabase,
        storage: Arc<dyn StorageBackend>,
    ) -> PostService {
        PostService::new(
            PostRepository::new(Arc::new(post_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            VisibilityService::new(FollowingRepository::new(Arc::new(following_db.into_connection()))),
            storage,
        )
    }

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(PNG), Some("image/png"));
        assert_eq!(sniff_image_type(b"GIF89a..."), Some("image/gif"));
        assert_eq!(sniff_image_type(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_feed_query_bounds() {
        assert!(FeedQuery { page: 0, size: 10 }.validate().is_ok());
        assert!(FeedQuery { page: 0, size: 11 }.validate().is_err());
        assert!(FeedQuery { page: 0, size: 0 }.validate().is_err());
        assert!(FeedQuery { page: -1, size: 5 }.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_requires_caption_and_attachments() {
        let service = service(mock(), mock(), mock(), Arc::new(NoOpStorage));
        let owner = create_test_user("u1", false);

        let result = service
            .create(
                &owner,
                CreatePostInput {
                    caption: None,
                    attachments: vec![],
                },
            )
            .await;

        match result {
            Err(AppError::Validation(errors)) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("caption"));
                assert!(fields.contains_key("post_attachments"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_non_image() {
        let storage = Arc::new(RecordingStorage::default());
        let service = service(mock(), mock(), mock(), storage.clone());
        let owner = create_test_user("u1", false);

        let result = service
            .create(
                &owner,
                CreatePostInput {
                    caption: Some("hi".to_string()),
                    attachments: vec![AttachmentUpload {
                        file_name: "doc.pdf".to_string(),
                        data: b"%PDF-1.7".to_vec(),
                    }],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(storage.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_stores_blobs_in_order() {
        let storage = Arc::new(RecordingStorage::default());
        let post_db = mock()
            .append_query_results([[create_test_post("p1", "u1")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }]);
        let service = service(post_db, mock(), mock(), storage.clone());
        let owner = create_test_user("u1", false);

        let created = service
            .create(
                &owner,
                CreatePostInput {
                    caption: Some("two pictures".to_string()),
                    attachments: vec![
                        AttachmentUpload {
                            file_name: "a.png".to_string(),
                            data: PNG.to_vec(),
                        },
                        AttachmentUpload {
                            file_name: "b.gif".to_string(),
                            data: b"GIF89a....".to_vec(),
                        },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(created.attachments.len(), 2);
        assert_eq!(created.attachments[0].position, 0);
        assert_eq!(created.attachments[1].position, 1);
        assert!(created.attachments[0].storage_path.ends_with(".png"));
        assert!(created.attachments[1].storage_path.ends_with(".gif"));
        assert_eq!(storage.puts.lock().unwrap().len(), 2);
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_removes_blobs_when_insert_fails() {
        let storage = Arc::new(RecordingStorage::default());
        let post_db = mock().append_query_errors([sea_orm::DbErr::Custom("boom".to_string())]);
        let service = service(post_db, mock(), mock(), storage.clone());
        let owner = create_test_user("u1", false);

        let result = service
            .create(
                &owner,
                CreatePostInput {
                    caption: Some("hi".to_string()),
                    attachments: vec![AttachmentUpload {
                        file_name: "a.png".to_string(),
                        data: PNG.to_vec(),
                    }],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(*storage.puts.lock().unwrap(), *storage.deletes.lock().unwrap());
    }

    #[tokio::test]
    async fn test_list_for_user_hides_private_posts_from_strangers() {
        // No post queries queued: a post lookup would error.
        let following_db = mock().append_query_results([Vec::<following::Model>::new()]);
        let service = service(mock(), mock(), following_db, Arc::new(NoOpStorage));

        let posts = service
            .list_for_user("alice", &create_test_user("bob", true))
            .await
            .unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_list_for_user_public() {
        let post_db = mock()
            .append_query_results([[create_test_post("p1", "bob")]])
            .append_query_results([Vec::<post_attachment::Model>::new()]);
        let service = service(post_db, mock(), mock(), Arc::new(NoOpStorage));

        let posts = service
            .list_for_user("alice", &create_test_user("bob", false))
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author.id, "bob");
    }

    #[tokio::test]
    async fn test_feed_rejects_oversized_page() {
        let service = service(mock(), mock(), mock(), Arc::new(NoOpStorage));
        let result = service.feed("alice", &FeedQuery { page: 0, size: 50 }).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_feed_rejects_page_past_offset_range() {
        // No queries queued: reaching the database would error instead.
        let service = service(mock(), mock(), mock(), Arc::new(NoOpStorage));

        let result = service
            .feed(
                "alice",
                &FeedQuery {
                    page: 1_000_000_000_000_000_000,
                    size: 10,
                },
            )
            .await;

        match result {
            Err(AppError::Validation(errors)) => {
                assert!(errors.field_errors().contains_key("page"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_feed_uses_visibility_scope() {
        let following_db = mock().append_query_results([Vec::<following::Model>::new()]);
        let post_db = mock()
            .append_query_results([[create_test_post("p1", "carol")]])
            .append_query_results([Vec::<post_attachment::Model>::new()]);
        let user_db = mock().append_query_results([[create_test_user("carol", false)]]);
        let service = service(post_db, user_db, following_db, Arc::new(NoOpStorage));

        let feed = service.feed("alice", &FeedQuery::default()).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author.id, "carol");
    }

    #[tokio::test]
    async fn test_delete_other_users_post_is_forbidden() {
        let post_db = mock().append_query_results([[create_test_post("p1", "bob")]]);
        let service = service(post_db, mock(), mock(), Arc::new(NoOpStorage));

        let result = service.delete("alice", "p1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_post() {
        let post_db = mock().append_query_results([Vec::<post::Model>::new()]);
        let service = service(post_db, mock(), mock(), Arc::new(NoOpStorage));

        let result = service.delete("alice", "p1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_own_post() {
        let post_db = mock()
            .append_query_results([[create_test_post("p1", "alice")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service(post_db, mock(), mock(), Arc::new(NoOpStorage));

        service.delete("alice", "p1").await.unwrap();
    }
}
