//! services/api/src/adapters/storage.rs
//!
//! This module contains the object-storage adapter for exported artifacts.
//! It implements the `StorageService` port from the `core` crate by writing
//! files under a configured root; the web server makes that directory
//! publicly reachable under `/files`.

use async_trait::async_trait;
use std::path::PathBuf;
use storybook_core::ports::{PortError, PortResult, StorageService};
use uuid::Uuid;

/// A filesystem-backed storage adapter. Stored objects get UUID names so
/// published artifacts can never collide or be overwritten.
#[derive(Clone)]
pub struct FsStorageAdapter {
    root: PathBuf,
    public_base_url: String,
}

impl FsStorageAdapter {
    /// Creates the adapter, ensuring the storage root exists.
    pub async fn new(root: PathBuf, public_base_url: String) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn extension_for(mime_type: &str) -> &'static str {
        match mime_type {
            "text/html" => "html",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "audio/mpeg" => "mp3",
            "application/zip" => "zip",
            _ => "bin",
        }
    }
}

#[async_trait]
impl StorageService for FsStorageAdapter {
    async fn store(&self, content: &[u8], mime_type: &str) -> PortResult<String> {
        let name = format!("{}.{}", Uuid::new_v4(), Self::extension_for(mime_type));
        let path = self.root.join(&name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to store artifact: {e}")))?;
        Ok(format!("{}/files/{}", self.public_base_url, name))
    }
}
