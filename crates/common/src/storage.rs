//! Blob storage for uploaded post attachments.

use std::path::PathBuf;

use crate::{AppError, AppResult, config::StorageConfig};

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a blob under `key`.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<()>;

    /// Remove a blob. Missing keys are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Public URL for a key.
    fn public_url(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self { base_path, base_url }
    }

    /// Build a backend from configuration.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.base_path.clone(), config.base_url.clone())
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<()> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        tracing::debug!(key = %key, size = data.len(), content_type = %content_type, "Stored blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.base_path.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Storage backend that keeps nothing. Used in tests.
#[derive(Debug, Clone, Default)]
pub struct NoOpStorage;

#[async_trait::async_trait]
impl StorageBackend for NoOpStorage {
    async fn put(&self, _key: &str, _data: &[u8], _content_type: &str) -> AppResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/storage/{key}")
    }
}

/// Generate a unique storage key for a post attachment.
///
/// Keys look like `posts/2024/05/01/<user>/<millis>_<uuid>.<ext>`.
#[must_use]
pub fn generate_storage_key(user_id: &str, original_name: &str) -> String {
    use chrono::Utc;

    let now = Utc::now();
    let date_path = now.format("%Y/%m/%d").to_string();
    let timestamp = now.timestamp_millis();

    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);

    format!(
        "posts/{date_path}/{user_id}/{timestamp}_{}.{extension}",
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_key() {
        let key = generate_storage_key("user123", "photo.JPG");
        assert!(key.starts_with("posts/"));
        assert!(key.contains("/user123/"));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn test_generate_storage_key_no_extension() {
        assert!(generate_storage_key("user123", "file").ends_with(".bin"));
        assert!(generate_storage_key("user123", ".hidden").ends_with(".bin"));
        assert!(generate_storage_key("user123", "x.../etc").ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_local_storage_put_and_delete() {
        let dir = std::env::temp_dir().join(format!("folio-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "/storage/".to_string());

        storage
            .put("posts/a/b.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(storage.public_url("posts/a/b.png"), "/storage/posts/a/b.png");
        let path = dir.join("posts/a/b.png");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png-bytes");

        storage.delete("posts/a/b.png").await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());

        // deleting twice is fine
        storage.delete("posts/a/b.png").await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
