//! User service: registration, credentials and profile updates.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use folio_common::{AppError, AppResult, IdGenerator, Patch};
use folio_db::{
    entities::user,
    repositories::{ProfileChanges, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

const MAX_FULL_NAME_CHARS: usize = 255;
const MAX_BIO_CHARS: usize = 500;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for registering a new user. Missing fields fail validation.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 255, message = "The full name field is required."))]
    pub full_name: String,

    #[validate(
        length(min = 1, max = 128, message = "The username must be 1 to 128 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(length(min = 1, max = 128, message = "The password field is required."))]
    pub password: String,
}

/// Input for logging in.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginInput {
    #[validate(length(min = 1, message = "The username field is required."))]
    pub username: String,

    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

/// Partial profile update. Omitted fields are left unchanged; `bio: null` clears the bio.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub full_name: Patch<String>,
    #[serde(default)]
    pub bio: Patch<Option<String>>,
    #[serde(default, deserialize_with = "folio_common::patch::deserialize_flag")]
    pub is_private: Patch<bool>,
}

impl UpdateProfileInput {
    /// Check field lengths.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(full_name) = self.full_name.as_update() {
            if full_name.trim().is_empty() {
                errors.add("full_name", message("required", "The full name may not be empty."));
            } else if full_name.chars().count() > MAX_FULL_NAME_CHARS {
                errors.add(
                    "full_name",
                    message("length", "The full name may not be greater than 255 characters."),
                );
            }
        }

        if let Some(Some(bio)) = self.bio.as_update() {
            if bio.chars().count() > MAX_BIO_CHARS {
                errors.add(
                    "bio",
                    message("length", "The bio may not be greater than 500 characters."),
                );
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn message(code: &'static str, text: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(text.into());
    error
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        Ok(())
    } else {
        Err(message(
            "username",
            "The username may only contain letters, numbers, dots and underscores.",
        ))
    }
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user. The returned model carries a fresh token.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::field(
                "username",
                "unique",
                "The username has already been taken.",
            ));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            full_name: Set(input.full_name.trim().to_string()),
            bio: Set(None),
            is_private: Set(false),
            password_hash: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Check credentials and issue a new token.
    pub async fn login(&self, input: LoginInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(username = %input.username, "Rejected login");
            return Err(AppError::Unauthorized);
        }

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Invalidate the user's token.
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(None);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await?;
        Ok(())
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_username(username).await
    }

    /// Users the viewer has not followed or requested yet.
    pub async fn list_unfollowed(&self, viewer_id: &str) -> AppResult<Vec<user::Model>> {
        self.user_repo.find_unfollowed_by(viewer_id).await
    }

    /// Apply a partial profile update.
    ///
    /// Switching from private to public accepts all pending follow requests
    /// in the same transaction.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let changes = ProfileChanges {
            full_name: match input.full_name {
                Patch::Update(name) => Patch::Update(name.trim().to_string()),
                Patch::Keep => Patch::Keep,
            },
            bio: input.bio,
            is_private: input.is_private,
        };

        let update = self.user_repo.update_profile(user_id, changes).await?;

        if update.accepted_requests > 0 {
            tracing::info!(
                user_id = %user_id,
                accepted = update.accepted_requests,
                "Account made public, pending follow requests accepted"
            );
        }

        Ok(update.user)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
