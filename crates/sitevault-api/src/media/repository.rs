//! Media object lookup
//!
//! Gallery rows are written by the document-upload flow; the proxy only reads
//! them to find the storage path and declared MIME type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::RepositoryError;

/// Stored media object reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MediaObject {
    pub id: Uuid,
    pub file_name: Option<String>,
    /// Path inside the storage bucket
    pub file_path: Option<String>,
    /// Declared MIME type
    pub file_type: Option<String>,
}

impl MediaObject {
    /// Storage path, if the row has a usable one
    pub fn storage_path(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaObject>, RepositoryError>;
}

/// PostgreSQL-backed gallery lookup
#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaObject>, RepositoryError> {
        let media = sqlx::query_as::<_, MediaObject>(
            "SELECT id, file_name, file_path, file_type FROM gallery WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }
}
