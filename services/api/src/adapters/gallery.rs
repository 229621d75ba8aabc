//! services/api/src/adapters/gallery.rs
//!
//! This module contains the document-store adapter for the public gallery.
//! It implements the `GalleryService` port from the `core` crate using
//! PostgreSQL via `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use storybook_core::domain::{NewPublicStory, PublicStory};
use storybook_core::ports::{GalleryService, PortError, PortResult};
use uuid::Uuid;

/// A database adapter that implements the `GalleryService` port.
#[derive(Clone)]
pub struct GalleryDbAdapter {
    pool: PgPool,
}

impl GalleryDbAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(FromRow)]
struct StoryRecord {
    id: Uuid,
    title: String,
    author: String,
    cover_image_url: String,
    html_url: String,
    created_at: DateTime<Utc>,
}

impl StoryRecord {
    fn to_domain(self) -> PublicStory {
        PublicStory {
            id: self.id,
            title: self.title,
            author: self.author,
            cover_image_url: self.cover_image_url,
            html_url: self.html_url,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl GalleryService for GalleryDbAdapter {
    async fn publish(&self, entry: NewPublicStory) -> PortResult<PublicStory> {
        let record = sqlx::query_as::<_, StoryRecord>(
            "INSERT INTO stories (title, author, cover_image_url, html_url) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, title, author, cover_image_url, html_url, created_at",
        )
        .bind(&entry.title)
        .bind(&entry.author)
        .bind(&entry.cover_image_url)
        .bind(&entry.html_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn list_recent(&self, limit: i64) -> PortResult<Vec<PublicStory>> {
        let records = sqlx::query_as::<_, StoryRecord>(
            "SELECT id, title, author, cover_image_url, html_url, created_at \
             FROM stories ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
