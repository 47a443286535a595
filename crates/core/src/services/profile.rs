//! Profile detail service.

use crate::services::{
    post::{PostService, PostWithAttachments},
    visibility::{FollowStatus, VisibilityService},
};
use folio_common::AppResult;
use folio_db::{
    entities::user,
    repositories::{FollowingRepository, UserRepository},
};

/// Everything shown on a user's profile page.
#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: user::Model,
    /// `None` when viewing oneself or when no edge exists.
    pub follow_status: Option<FollowStatus>,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    /// Empty when the viewer may not see the user's content.
    pub posts: Vec<PostWithAttachments>,
}

/// Assembles profile pages.
#[derive(Clone)]
pub struct ProfileService {
    user_repo: UserRepository,
    following_repo: FollowingRepository,
    visibility: VisibilityService,
    posts: PostService,
}

impl ProfileService {
    /// Create a new profile service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        following_repo: FollowingRepository,
        visibility: VisibilityService,
        posts: PostService,
    ) -> Self {
        Self {
            user_repo,
            following_repo,
            visibility,
            posts,
        }
    }

    /// Profile of `username` as seen by `viewer_id`.
    pub async fn detail(&self, viewer_id: &str, username: &str) -> AppResult<UserDetail> {
        let user = self.user_repo.get_by_username(username).await?;

        let status = self.visibility.status_between(viewer_id, &user.id).await?;
        let follow_status =
            (viewer_id != user.id && status != FollowStatus::None).then_some(status);

        let posts_count = self.posts.count_for_user(&user.id).await?;
        let followers_count = self.following_repo.count_followers(&user.id).await?;
        let following_count = self.following_repo.count_following(&user.id).await?;

        let posts = self.posts.list_for_user(viewer_id, &user).await?;

        Ok(UserDetail {
            user,
            follow_status,
            posts_count,
            followers_count,
            following_count,
            posts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use folio_common::{AppError, NoOpStorage};
    use folio_db::{
        entities::{following, post, post_attachment},
        repositories::PostRepository,
    };
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::sync::Arc;

    fn create_test_user(id: &str, is_private: bool) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_string(),
            full_name: id.to_string(),
            bio: Some("hi".to_string()),
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
            caption: "caption".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn create_test_following(follower_id: &str, followee_id: &str, accepted: bool) -> following::Model {
        following::Model {
            id: format!("{follower_id}-{followee_id}"),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            is_accepted: accepted,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, Value> {
        btreemap! { "num_items" => Value::BigInt(Some(n)) }
    }

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    /// Separate connections per repository so each mock queue stays ordered.
    fn service(
        user_db: MockDatabase,
        status_db: MockDatabase,
        counts_db: MockDatabase,
        post_db: MockDatabase,
    ) -> ProfileService {
        let users = UserRepository::new(Arc::new(user_db.into_connection()));
        let visibility =
            VisibilityService::new(FollowingRepository::new(Arc::new(status_db.into_connection())));
        let posts = PostService::new(
            PostRepository::new(Arc::new(post_db.into_connection())),
            users.clone(),
            visibility.clone(),
            Arc::new(NoOpStorage),
        );
        ProfileService::new(
            users,
            FollowingRepository::new(Arc::new(counts_db.into_connection())),
            visibility,
            posts,
        )
    }

    #[tokio::test]
    async fn test_private_profile_hides_posts_from_requester() {
        let user_db = mock().append_query_results([[create_test_user("bob", true)]]);
        // once for the status, once for the post gate
        let status_db = mock().append_query_results([
            [create_test_following("alice", "bob", false)],
            [create_test_following("alice", "bob", false)],
        ]);
        let counts_db = mock().append_query_results([[count_row(0)], [count_row(4)]]);
        let post_db = mock().append_query_results([[count_row(2)]]);

        let detail = service(user_db, status_db, counts_db, post_db)
            .detail("alice", "bob")
            .await
            .unwrap();

        assert_eq!(detail.follow_status, Some(FollowStatus::Requested));
        assert_eq!(detail.posts_count, 2);
        assert_eq!(detail.followers_count, 0);
        assert_eq!(detail.following_count, 4);
        assert!(detail.posts.is_empty());
    }

    #[tokio::test]
    async fn test_accepted_follower_sees_private_posts() {
        // bob requested to follow private alice and alice accepted
        let user_db = mock().append_query_results([[create_test_user("alice", true)]]);
        let status_db = mock().append_query_results([
            [create_test_following("bob", "alice", true)],
            [create_test_following("bob", "alice", true)],
        ]);
        let counts_db = mock().append_query_results([[count_row(1)], [count_row(0)]]);
        let post_db = mock()
            .append_query_results([[count_row(1)]])
            .append_query_results([[create_test_post("p1", "alice")]])
            .append_query_results([Vec::<post_attachment::Model>::new()]);

        let detail = service(user_db, status_db, counts_db, post_db)
            .detail("bob", "alice")
            .await
            .unwrap();

        assert_eq!(detail.follow_status, Some(FollowStatus::Following));
        assert_eq!(detail.followers_count, 1);
        assert_eq!(detail.posts.len(), 1);
        assert_eq!(detail.posts[0].author.id, "alice");
    }

    #[tokio::test]
    async fn test_own_profile_has_no_status_and_shows_posts() {
        let user_db = mock().append_query_results([[create_test_user("bob", true)]]);
        let counts_db = mock().append_query_results([[count_row(1)], [count_row(1)]]);
        let post_db = mock()
            .append_query_results([[count_row(1)]])
            .append_query_results([[create_test_post("p1", "bob")]])
            .append_query_results([Vec::<post_attachment::Model>::new()]);

        let detail = service(user_db, mock(), counts_db, post_db)
            .detail("bob", "bob")
            .await
            .unwrap();

        assert_eq!(detail.follow_status, None);
        assert_eq!(detail.posts.len(), 1);
        assert_eq!(detail.posts[0].post.id, "p1");
    }

    #[tokio::test]
    async fn test_unknown_username() {
        let user_db = mock().append_query_results([Vec::<user::Model>::new()]);

        let result = service(user_db, mock(), mock(), mock())
            .detail("alice", "ghost")
            .await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }
}
