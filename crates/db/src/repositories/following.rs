//! Following repository.

use std::sync::Arc;

use crate::entities::{Following, User, following};
use chrono::Utc;
use folio_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, UpdateMany,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};

/// Outcome of inserting a follow edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeInsert {
    /// The edge was created.
    Created(following::Model),
    /// An edge for the pair already exists.
    Duplicate,
}

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

/// `UPDATE following SET is_accepted = true` for every pending edge towards `followee_id`.
pub(crate) fn accept_pending_for(followee_id: &str) -> UpdateMany<Following> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    Following::update_many()
        .col_expr(following::Column::IsAccepted, Expr::value(true))
        .col_expr(following::Column::UpdatedAt, Expr::value(now))
        .filter(following::Column::FolloweeId.eq(followee_id))
        .filter(following::Column::IsAccepted.eq(false))
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the edge from `follower_id` to `followee_id`.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an edge from `follower_id` to `followee_id`.
    ///
    /// The followee row is read `FOR SHARE` inside the insert transaction, so
    /// `is_accepted` is computed from a privacy flag that cannot change until
    /// the edge is committed. A profile update that flips the flag waits for
    /// this transaction and then sees the new edge.
    pub async fn create_edge(
        &self,
        id: &str,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<EdgeInsert> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let followee = User::find_by_id(followee_id)
            .lock_shared()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::UserNotFound(followee_id.to_string()))?;

        let model = following::ActiveModel {
            id: Set(id.to_string()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            is_accepted: Set(!followee.is_private),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let inserted = model.insert(&txn).await;
        match inserted {
            Ok(edge) => {
                txn.commit()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(EdgeInsert::Created(edge))
            }
            Err(e) if crate::is_unique_violation(&e) => {
                txn.rollback()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(EdgeInsert::Duplicate)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Delete the edge for a pair. Returns whether a row was removed.
    pub async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let result = Following::delete_many()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Accept a pending edge. Returns false if the edge is missing or already accepted.
    pub async fn accept(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = Following::update_many()
            .col_expr(following::Column::IsAccepted, Expr::value(true))
            .col_expr(following::Column::UpdatedAt, Expr::value(now))
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .filter(following::Column::IsAccepted.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Accept every pending edge towards a user in a single statement.
    pub async fn accept_all_pending(&self, followee_id: &str) -> AppResult<u64> {
        let result = accept_pending_for(followee_id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Edges where the user is the follower, newest first.
    pub async fn find_following(&self, user_id: &str) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .order_by_desc(following::Column::CreatedAt)
            .order_by_desc(following::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Edges where the user is the followee, newest first.
    pub async fn find_followers(&self, user_id: &str) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .order_by_desc(following::Column::CreatedAt)
            .order_by_desc(following::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Pending edges towards the user, newest first.
    pub async fn find_pending(&self, user_id: &str) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .filter(following::Column::IsAccepted.eq(false))
            .order_by_desc(following::Column::CreatedAt)
            .order_by_desc(following::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of users the user follows with an accepted edge.
    pub async fn find_accepted_followee_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let edges = Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .filter(following::Column::IsAccepted.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(edges.into_iter().map(|e| e.followee_id).collect())
    }

    /// Count accepted followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .filter(following::Column::IsAccepted.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count accepted followees of a user.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .filter(following::Column::IsAccepted.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
