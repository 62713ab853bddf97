//! Document repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use cbp_core::{
    Document, DocumentFilter, DocumentRepository, Error, JobStatus, NewDocument, Result,
};

/// PostgreSQL implementation of [`DocumentRepository`].
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<Document> {
        let status: String = row.get("summary_status");
        Ok(Document {
            file_id: row.get("file_id"),
            state_center_id: row.get("state_center_id"),
            department_id: row.get("department_id"),
            uploader_id: row.get("uploader_id"),
            filename: row.get("filename"),
            stored_path: row.get("stored_path"),
            file_size_bytes: row.get("file_size_bytes"),
            summary_status: JobStatus::parse(&status),
            summary_text: row.get("summary_text"),
            summary_error: row.get("summary_error"),
            last_summary_request_id: row.get("last_summary_request_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str = "file_id, state_center_id, department_id, uploader_id, filename, \
     stored_path, file_size_bytes, summary_status, summary_text, summary_error, \
     last_summary_request_id, created_at, updated_at";

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create(&self, new: &NewDocument) -> Result<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO documents (file_id, state_center_id, department_id, uploader_id,
                 filename, stored_path, file_size_bytes, summary_status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'NOT_STARTED', $8, $8)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.state_center_id)
        .bind(new.department_id.as_deref())
        .bind(new.uploader_id)
        .bind(&new.filename)
        .bind(&new.stored_path)
        .bind(new.file_size_bytes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_row(row)
    }

    async fn get(&self, file_id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents WHERE file_id = $1"
        ))
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn get_many(&self, file_ids: &[Uuid]) -> Result<Vec<Document>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents WHERE file_id = ANY($1)
             ORDER BY created_at ASC"
        ))
        .bind(file_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn find_in_scope(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        filename: &str,
        uploader_id: Uuid,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents
             WHERE state_center_id = $1
               AND department_id IS NOT DISTINCT FROM $2
               AND filename = $3 AND uploader_id = $4
             LIMIT 1"
        ))
        .bind(state_center_id)
        .bind(department_id)
        .bind(filename)
        .bind(uploader_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<(i64, Vec<Document>)> {
        // Every parameter appears in the statement so bind counts always match.
        const WHERE_CLAUSE: &str = "WHERE ($1::text IS NULL OR state_center_id = $1)
               AND ($2::text IS NULL OR department_id = $2)
               AND ($3::text IS NULL OR filename ILIKE $3)
               AND ($4::uuid IS NULL OR uploader_id = $4)
               AND ($5::text IS NULL OR summary_status = $5)";

        let filename_pattern = filter.filename.as_ref().map(|f| format!("%{f}%"));

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM documents {WHERE_CLAUSE}"
        ))
        .bind(filter.state_center_id.as_deref())
        .bind(filter.department_id.as_deref())
        .bind(filename_pattern.as_deref())
        .bind(filter.uploader_id)
        .bind(filter.summary_status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let total: i64 = count_row.get("total");

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents {WHERE_CLAUSE}
             ORDER BY created_at DESC OFFSET $6 LIMIT $7"
        ))
        .bind(filter.state_center_id.as_deref())
        .bind(filter.department_id.as_deref())
        .bind(filename_pattern.as_deref())
        .bind(filter.uploader_id)
        .bind(filter.summary_status.map(|s| s.as_str()))
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let documents = rows
            .into_iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((total, documents))
    }

    async fn completed_summaries(
        &self,
        uploader_id: Uuid,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents
             WHERE uploader_id = $1 AND state_center_id = $2
               AND department_id IS NOT DISTINCT FROM $3
               AND summary_status = 'COMPLETED' AND summary_text IS NOT NULL
             ORDER BY created_at ASC"
        ))
        .bind(uploader_id)
        .bind(state_center_id)
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn set_summary_status(&self, file_id: Uuid, status: JobStatus) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET summary_status = $2, updated_at = $3 WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_summary_request_id(&self, file_id: Uuid, request_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET last_summary_request_id = $2, updated_at = $3 WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(request_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete_summary(&self, file_id: Uuid, summary_text: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET summary_status = 'COMPLETED', summary_text = $2, summary_error = NULL,
                 updated_at = $3
             WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(summary_text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail_summary(&self, file_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET summary_status = 'FAILED', summary_error = $2, updated_at = $3
             WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn reset_summary(&self, file_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE documents
             SET summary_status = 'NOT_STARTED', summary_text = NULL, summary_error = NULL,
                 last_summary_request_id = NULL, updated_at = $2
             WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, file_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
