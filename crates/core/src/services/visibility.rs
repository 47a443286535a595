//! Relationship status and content visibility.
//!
//! Status is recomputed from the follow edge on every call; nothing here is
//! cached, so a follow, unfollow or accept is visible to the next request.

use folio_common::AppResult;
use folio_db::{
    entities::{User, following, post, user},
    repositories::FollowingRepository,
};
use sea_orm::{ColumnTrait, Condition, sea_query::Query};
use serde::Serialize;

/// Relationship of a viewer towards another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    /// No edge.
    None,
    /// Pending edge to a private account.
    Requested,
    /// Accepted edge.
    Following,
}

impl FollowStatus {
    /// Status implied by an edge, if one exists.
    #[must_use]
    pub const fn from_edge(edge: Option<&following::Model>) -> Self {
        match edge {
            None => Self::None,
            Some(e) if e.is_accepted => Self::Following,
            Some(_) => Self::Requested,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Requested => "requested",
            Self::Following => "following",
        }
    }
}

/// Whether `viewer_id` may see `target`'s posts given their relationship.
#[must_use]
pub fn can_view_content(viewer_id: &str, target: &user::Model, status: FollowStatus) -> bool {
    viewer_id == target.id || !target.is_private || status == FollowStatus::Following
}

/// The set of post owners a viewer may see, for paginated queries.
#[derive(Debug, Clone)]
pub struct FeedScope {
    viewer_id: String,
    followee_ids: Vec<String>,
}

impl FeedScope {
    /// Build a scope from the viewer and the IDs they follow with an accepted edge.
    #[must_use]
    pub const fn new(viewer_id: String, followee_ids: Vec<String>) -> Self {
        Self {
            viewer_id,
            followee_ids,
        }
    }

    /// SQL predicate over `post.user_id`, the same rule as [`can_view_content`].
    #[must_use]
    pub fn condition(&self) -> Condition {
        let public_owners = Query::select()
            .column(user::Column::Id)
            .from(User)
            .and_where(user::Column::IsPrivate.eq(false))
            .to_owned();

        let mut condition = Condition::any()
            .add(post::Column::UserId.eq(self.viewer_id.as_str()))
            .add(post::Column::UserId.in_subquery(public_owners));

        if !self.followee_ids.is_empty() {
            condition = condition.add(post::Column::UserId.is_in(self.followee_ids.clone()));
        }

        condition
    }
}

/// Resolves relationship status and visibility against the database.
#[derive(Clone)]
pub struct VisibilityService {
    following_repo: FollowingRepository,
}

impl VisibilityService {
    /// Create a new visibility service.
    #[must_use]
    pub const fn new(following_repo: FollowingRepository) -> Self {
        Self { following_repo }
    }

    /// Status of `viewer_id` towards `target_id`.
    pub async fn status_between(&self, viewer_id: &str, target_id: &str) -> AppResult<FollowStatus> {
        if viewer_id == target_id {
            return Ok(FollowStatus::None);
        }
        let edge = self.following_repo.find_by_pair(viewer_id, target_id).await?;
        Ok(FollowStatus::from_edge(edge.as_ref()))
    }

    /// Whether `viewer_id` may see `target`'s posts.
    pub async fn can_view(&self, viewer_id: &str, target: &user::Model) -> AppResult<bool> {
        // Self and public targets need no edge lookup.
        if can_view_content(viewer_id, target, FollowStatus::None) {
            return Ok(true);
        }
        let status = self.status_between(viewer_id, &target.id).await?;
        Ok(can_view_content(viewer_id, target, status))
    }

    /// Feed scope for a viewer.
    pub async fn feed_scope(&self, viewer_id: &str) -> AppResult<FeedScope> {
        let followee_ids = self
            .following_repo
            .find_accepted_followee_ids(viewer_id)
            .await?;
        Ok(FeedScope::new(viewer_id.to_string(), followee_ids))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, EntityTrait, MockDatabase, QueryFilter, QueryTrait};
    use std::sync::Arc;

    fn account(id: &str, is_private: bool) -> user::Model {
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

    fn edge(follower_id: &str, followee_id: &str, accepted: bool) -> following::Model {
        following::Model {
            id: format!("{follower_id}-{followee_id}"),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            is_accepted: accepted,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_visibility_truth_table() {
        let public = account("pub", false);
        let private = account("priv", true);

        for status in [FollowStatus::None, FollowStatus::Requested, FollowStatus::Following] {
            // own content is always visible
            assert!(can_view_content("priv", &private, status));
            // public content is always visible
            assert!(can_view_content("viewer", &public, status));
        }

        assert!(!can_view_content("viewer", &private, FollowStatus::None));
        assert!(!can_view_content("viewer", &private, FollowStatus::Requested));
        assert!(can_view_content("viewer", &private, FollowStatus::Following));
    }

    #[test]
    fn test_status_from_edge() {
        assert_eq!(FollowStatus::from_edge(None), FollowStatus::None);
        assert_eq!(
            FollowStatus::from_edge(Some(&edge("a", "b", false))),
            FollowStatus::Requested
        );
        assert_eq!(
            FollowStatus::from_edge(Some(&edge("a", "b", true))),
            FollowStatus::Following
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(FollowStatus::Requested).unwrap(),
            serde_json::json!("requested")
        );
        assert_eq!(FollowStatus::Following.as_str(), "following");
    }

    #[test]
    fn test_feed_scope_condition() {
        let sql = |scope: FeedScope| {
            post::Entity::find()
                .filter(scope.condition())
                .build(DatabaseBackend::Postgres)
                .to_string()
        };

        let with_followee = sql(FeedScope::new("alice".to_string(), vec!["bob".to_string()]));
        assert!(with_followee.contains(r#""post"."user_id" = 'alice'"#));
        assert!(with_followee.contains(r#""is_private" = FALSE"#));
        assert!(with_followee.contains(r#""post"."user_id" IN ('bob')"#));

        // no accepted follows: only own and public posts
        let alone = sql(FeedScope::new("alice".to_string(), vec![]));
        assert!(!alone.contains("IN ('"));
    }

    #[tokio::test]
    async fn test_can_view_private_requires_accepted_edge() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge("alice", "bob", false)]])
                .append_query_results([[edge("alice", "bob", true)]])
                .into_connection(),
        );
        let service = VisibilityService::new(FollowingRepository::new(db));
        let bob = account("bob", true);

        assert!(!service.can_view("alice", &bob).await.unwrap());
        assert!(service.can_view("alice", &bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_view_public_skips_lookup() {
        // No query results queued: any lookup would error.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = VisibilityService::new(FollowingRepository::new(db));

        assert!(service.can_view("alice", &account("bob", false)).await.unwrap());
        assert!(service.can_view("bob", &account("bob", true)).await.unwrap());
    }
}
