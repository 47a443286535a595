//! ID and token generation.

use ulid::Ulid;
use uuid::Uuid;

/// Generator for row identifiers and API tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a lowercase ULID.
    ///
    /// IDs sort by creation time, so `ORDER BY id` doubles as a stable
    /// tie-breaker for rows sharing a `created_at`.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque bearer token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // v4 carries no timestamp
        Uuid::new_v4().simple().to_string()
    }
}
