//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, PostAttachment, post, post_attachment};
use chrono::Utc;
use folio_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
    sea_query::Expr,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a live (not deleted) post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .filter(post::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a post and its attachments in one transaction.
    pub async fn create_with_attachments(
        &self,
        post: post::ActiveModel,
        attachments: &[post_attachment::Model],
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = post
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !attachments.is_empty() {
            let rows = attachments.iter().map(|a| post_attachment::ActiveModel {
                id: Set(a.id.clone()),
                post_id: Set(a.post_id.clone()),
                storage_path: Set(a.storage_path.clone()),
                position: Set(a.position),
                created_at: Set(a.created_at),
            });

            PostAttachment::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Live posts matching `scope`, newest first.
    pub async fn find_page(
        &self,
        scope: Condition,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::DeletedAt.is_null())
            .filter(scope)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Live posts of one user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::UserId.eq(user_id))
            .filter(post::Column::DeletedAt.is_null())
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count live posts of one user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        Post::find()
            .filter(post::Column::UserId.eq(user_id))
            .filter(post::Column::DeletedAt.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Attachments of the given posts, ordered by post then position.
    pub async fn find_attachments(
        &self,
        post_ids: &[String],
    ) -> AppResult<Vec<post_attachment::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        PostAttachment::find()
            .filter(post_attachment::Column::PostId.is_in(post_ids.to_vec()))
            .order_by_asc(post_attachment::Column::PostId)
            .order_by_asc(post_attachment::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Soft-delete a post. Returns false if it was missing or already deleted.
    pub async fn soft_delete(&self, id: &str) -> AppResult<bool> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = Post::update_many()
            .col_expr(post::Column::DeletedAt, Expr::value(now))
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::DeletedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}
