//! Following service.

use std::collections::HashMap;

use crate::services::visibility::FollowStatus;
use folio_common::{AppError, AppResult, IdGenerator};
use folio_db::{
    entities::{following, user},
    repositories::{EdgeInsert, FollowingRepository, UserRepository},
};

/// A user the caller follows.
#[derive(Debug, Clone)]
pub struct FollowingEntry {
    pub user: user::Model,
    /// The edge is still waiting for acceptance.
    pub is_requested: bool,
}

/// A user following the caller.
#[derive(Debug, Clone)]
pub struct FollowerEntry {
    pub user: user::Model,
    pub is_accepted: bool,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(following_repo: FollowingRepository, user_repo: UserRepository) -> Self {
        Self {
            following_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow a user.
    ///
    /// Public targets are followed immediately; private targets get a pending
    /// request. Following someone twice is an error that reports the existing
    /// status.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<FollowStatus> {
        if follower_id == followee_id {
            return Err(AppError::InvalidOperation(
                "You are not allowed to follow yourself".to_string(),
            ));
        }

        let followee = self.user_repo.get_by_id(followee_id).await?;

        if let Some(existing) = self
            .following_repo
            .find_by_pair(follower_id, followee_id)
            .await?
        {
            return Err(already_following(&followee, Some(&existing)));
        }

        let id = self.id_gen.generate();
        match self
            .following_repo
            .create_edge(&id, follower_id, followee_id)
            .await?
        {
            EdgeInsert::Created(edge) => {
                let status = FollowStatus::from_edge(Some(&edge));
                tracing::info!(
                    follower_id = %follower_id,
                    followee_id = %followee_id,
                    accepted = edge.is_accepted,
                    "Follow edge created"
                );
                Ok(status)
            }
            EdgeInsert::Duplicate => {
                // Lost a race with a concurrent follow of the same pair.
                let existing = self
                    .following_repo
                    .find_by_pair(follower_id, followee_id)
                    .await?;
                Err(already_following(&followee, existing.as_ref()))
            }
        }
    }

    /// Remove the caller's edge towards a user, accepted or pending.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let followee = self.user_repo.get_by_id(followee_id).await?;

        if !self
            .following_repo
            .delete_by_pair(follower_id, followee_id)
            .await?
        {
            return Err(AppError::RelationshipNotFound(format!(
                "You are not following {}",
                followee.username
            )));
        }

        tracing::info!(follower_id = %follower_id, followee_id = %followee_id, "Follow edge removed");
        Ok(())
    }

    /// Accept a pending follow request from `follower_id` to the caller.
    pub async fn accept(&self, followee_id: &str, follower_id: &str) -> AppResult<()> {
        let follower = self.user_repo.get_by_id(follower_id).await?;

        let edge = self
            .following_repo
            .find_by_pair(follower_id, followee_id)
            .await?
            .ok_or_else(|| not_following_you(&follower))?;

        if edge.is_accepted {
            return Err(AppError::InvalidOperation(
                "Follow request is already accepted".to_string(),
            ));
        }

        if !self.following_repo.accept(follower_id, followee_id).await? {
            // Changed between the read and the update.
            return match self
                .following_repo
                .find_by_pair(follower_id, followee_id)
                .await?
            {
                None => Err(not_following_you(&follower)),
                Some(_) => Err(AppError::InvalidOperation(
                    "Follow request is already accepted".to_string(),
                )),
            };
        }

        tracing::info!(follower_id = %follower_id, followee_id = %followee_id, "Follow request accepted");
        Ok(())
    }

    /// Accept every pending request towards a user.
    pub async fn accept_all_pending(&self, user_id: &str) -> AppResult<u64> {
        let accepted = self.following_repo.accept_all_pending(user_id).await?;
        if accepted > 0 {
            tracing::info!(user_id = %user_id, accepted, "Accepted pending follow requests");
        }
        Ok(accepted)
    }

    /// Users the caller follows, with pending edges flagged.
    pub async fn list_following(&self, user_id: &str) -> AppResult<Vec<FollowingEntry>> {
        let edges = self.following_repo.find_following(user_id).await?;
        let users = self.load_users(edges.iter().map(|e| e.followee_id.clone())).await?;

        Ok(edges
            .into_iter()
            .filter_map(|edge| {
                users.get(&edge.followee_id).map(|u| FollowingEntry {
                    user: u.clone(),
                    is_requested: !edge.is_accepted,
                })
            })
            .collect())
    }

    /// Users following the caller, accepted or not.
    pub async fn list_followers(&self, user_id: &str) -> AppResult<Vec<FollowerEntry>> {
        let edges = self.following_repo.find_followers(user_id).await?;
        self.follower_entries(edges).await
    }

    /// Users with a pending request towards the caller.
    pub async fn list_pending(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        let edges = self.following_repo.find_pending(user_id).await?;
        Ok(self
            .follower_entries(edges)
            .await?
            .into_iter()
            .map(|entry| entry.user)
            .collect())
    }

    async fn follower_entries(&self, edges: Vec<following::Model>) -> AppResult<Vec<FollowerEntry>> {
        let users = self.load_users(edges.iter().map(|e| e.follower_id.clone())).await?;

        Ok(edges
            .into_iter()
            .filter_map(|edge| {
                users.get(&edge.follower_id).map(|u| FollowerEntry {
                    user: u.clone(),
                    is_accepted: edge.is_accepted,
                })
            })
            .collect())
    }

    async fn load_users(
        &self,
        ids: impl Iterator<Item = String>,
    ) -> AppResult<HashMap<String, user::Model>> {
        let ids: Vec<String> = ids.collect();
        Ok(self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect())
    }
}

fn already_following(followee: &user::Model, edge: Option<&following::Model>) -> AppError {
    let status = match FollowStatus::from_edge(edge) {
        FollowStatus::Following => FollowStatus::Following,
        // A missing edge after a duplicate insert means it was just removed; report the pending form.
        FollowStatus::Requested | FollowStatus::None => FollowStatus::Requested,
    };
    AppError::AlreadyFollowing {
        username: followee.username.clone(),
        status: status.as_str(),
    }
}

fn not_following_you(follower: &user::Model) -> AppError {
    AppError::RelationshipNotFound(format!("{} is not following you", follower.username))
}
