//! User repository.

use std::sync::Arc;

use crate::entities::{Following, User, following, user};
use crate::repositories::following::accept_pending_for;
use chrono::Utc;
use folio_common::{AppError, AppResult, Patch};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Query,
};

/// Profile fields to change. Untouched fields are left as stored.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    /// Display name.
    pub full_name: Patch<String>,
    /// Profile text; `Update(None)` clears it.
    pub bio: Patch<Option<String>>,
    /// Privacy flag.
    pub is_private: Patch<bool>,
}

/// Result of a profile update.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    /// The user after the update.
    pub user: user::Model,
    /// Pending follow requests accepted by a private-to-public switch.
    pub accepted_requests: u64,
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find users by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by username, ignoring case.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::UsernameLower.eq(username.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by username, returning an error if not found.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Find a user by token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    ///
    /// A username taken by a concurrent insert surfaces as a field error,
    /// the same as the pre-insert check in registration.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if crate::is_unique_violation(&e) {
                AppError::field("username", "unique", "The username has already been taken.")
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Users the viewer has no edge to (pending or accepted), excluding the viewer.
    pub async fn find_unfollowed_by(&self, viewer_id: &str) -> AppResult<Vec<user::Model>> {
        let followed = Query::select()
            .column(following::Column::FolloweeId)
            .from(Following)
            .and_where(following::Column::FollowerId.eq(viewer_id))
            .to_owned();

        User::find()
            .filter(user::Column::Id.ne(viewer_id))
            .filter(user::Column::Id.not_in_subquery(followed))
            .order_by_asc(user::Column::UsernameLower)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply profile changes in one transaction.
    ///
    /// The user row is locked `FOR UPDATE`. When the account goes from private
    /// to public, every pending incoming follow edge is accepted in the same
    /// transaction.
    pub async fn update_profile(
        &self,
        user_id: &str,
        changes: ProfileChanges,
    ) -> AppResult<ProfileUpdate> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let current = User::find_by_id(user_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let was_private = current.is_private;
        let mut active: user::ActiveModel = current.into();

        if let Patch::Update(full_name) = changes.full_name {
            active.full_name = Set(full_name);
        }
        if let Patch::Update(bio) = changes.bio {
            active.bio = Set(bio);
        }
        if let Patch::Update(is_private) = changes.is_private {
            active.is_private = Set(is_private);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let user = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let accepted_requests = if was_private && !user.is_private {
            accept_pending_for(&user.id)
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .rows_affected
        } else {
            0
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(ProfileUpdate {
            user,
            accepted_requests,
        })
    }
}
