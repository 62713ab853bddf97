//! Meta-summary repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use cbp_core::{Error, JobStatus, MetaSummary, MetaSummaryFilter, MetaSummaryRepository, Result};

/// PostgreSQL implementation of [`MetaSummaryRepository`].
pub struct PgMetaSummaryRepository {
    pool: PgPool,
}

impl PgMetaSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<MetaSummary> {
        let status: String = row.get("status");
        Ok(MetaSummary {
            request_id: row.get("request_id"),
            state_center_id: row.get("state_center_id"),
            department_id: row.get("department_id"),
            file_ids: row.get("file_ids"),
            status: JobStatus::parse(&status),
            summary_text: row.get("summary_text"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str = "request_id, state_center_id, department_id, file_ids, status, \
     summary_text, error_message, created_at, updated_at";

#[async_trait]
impl MetaSummaryRepository for PgMetaSummaryRepository {
    async fn create(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        file_ids: &[Uuid],
    ) -> Result<MetaSummary> {
        let row = sqlx::query(&format!(
            "INSERT INTO meta_summaries (request_id, state_center_id, department_id,
                 file_ids, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'PENDING', $5, $5)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(state_center_id)
        .bind(department_id)
        .bind(file_ids)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_row(row)
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<MetaSummary>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM meta_summaries WHERE request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn list(&self, filter: &MetaSummaryFilter) -> Result<(i64, Vec<MetaSummary>)> {
        const WHERE_CLAUSE: &str = "WHERE ($1::text IS NULL OR state_center_id = $1)
               AND ($2::text IS NULL OR department_id = $2)
               AND ($3::text IS NULL OR status = $3)";

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM meta_summaries {WHERE_CLAUSE}"
        ))
        .bind(filter.state_center_id.as_deref())
        .bind(filter.department_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let total: i64 = count_row.get("total");

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM meta_summaries {WHERE_CLAUSE}
             ORDER BY created_at DESC OFFSET $4 LIMIT $5"
        ))
        .bind(filter.state_center_id.as_deref())
        .bind(filter.department_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let summaries = rows
            .into_iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((total, summaries))
    }

    async fn set_status(&self, request_id: Uuid, status: JobStatus) -> Result<()> {
        sqlx::query(
            "UPDATE meta_summaries SET status = $2, updated_at = $3 WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, request_id: Uuid, summary_text: &str) -> Result<()> {
        sqlx::query(
            "UPDATE meta_summaries
             SET status = 'COMPLETED', summary_text = $2, error_message = NULL, updated_at = $3
             WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(summary_text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, request_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE meta_summaries
             SET status = 'FAILED', error_message = $2, updated_at = $3
             WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_referencing(&self, file_id: Uuid) -> Result<Vec<MetaSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM meta_summaries WHERE $1 = ANY(file_ids)"
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn replace_file_ids(&self, request_id: Uuid, file_ids: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE meta_summaries
             SET file_ids = $2, status = 'PENDING', summary_text = NULL,
                 error_message = NULL, updated_at = $3
             WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(file_ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, request_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meta_summaries WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
