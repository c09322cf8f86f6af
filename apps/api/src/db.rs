use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::resume::{ResumeDocument, ResumeRow};

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// A stored document and the row version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResume {
    pub document: ResumeDocument,
    pub version: i64,
}

impl From<ResumeRow> for StoredResume {
    fn from(row: ResumeRow) -> Self {
        Self {
            document: row.document.0,
            version: row.version,
        }
    }
}

/// Resume documents scoped by owner. Every successful write bumps the row version.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    /// Returns the document only when `resume_id` belongs to `user_id`.
    async fn load(&self, user_id: Uuid, resume_id: Uuid)
        -> Result<Option<StoredResume>, sqlx::Error>;

    /// Inserts or replaces the document. Returns `false` when the id is already owned by
    /// a different user, in which case nothing is written.
    async fn save(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        document: &ResumeDocument,
    ) -> Result<bool, sqlx::Error>;

    /// Replaces the document only while the row is still at `expected_version`.
    /// Returns `false` when it was modified or removed since it was read.
    async fn save_if_unchanged(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        document: &ResumeDocument,
        expected_version: i64,
    ) -> Result<bool, sqlx::Error>;
}

/// `ResumeRepository` over the `resumes` table; documents are stored as JSONB.
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeRepository for PgResumeStore {
    async fn load(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
    ) -> Result<Option<StoredResume>, sqlx::Error> {
        let row = sqlx::query_as::<_, ResumeRow>(
            "SELECT document, version FROM resumes WHERE id = $1 AND user_id = $2",
        )
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        debug!("Loaded resume {resume_id} (found: {})", row.is_some());
        Ok(row.map(StoredResume::from))
    }

    async fn save(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        document: &ResumeDocument,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET document = EXCLUDED.document,
                    version = resumes.version + 1,
                    updated_at = NOW()
                WHERE resumes.user_id = EXCLUDED.user_id
            "#,
        )
        .bind(resume_id)
        .bind(user_id)
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_if_unchanged(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        document: &ResumeDocument,
        expected_version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET document = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND version = $4
            "#,
        )
        .bind(resume_id)
        .bind(user_id)
        .bind(Json(document))
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
