//! Course-recommendation repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use cbp_core::{
    CourseHit, Error, JobStatus, RankedCourse, Recommendation, RecommendationRepository, Result,
};

/// PostgreSQL implementation of [`RecommendationRepository`].
pub struct PgRecommendationRepository {
    pool: PgPool,
}

impl PgRecommendationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<Recommendation> {
        let status: String = row.get("status");
        let embedding: Option<Vector> = row.get("embedding");
        Ok(Recommendation {
            id: row.get("id"),
            user_id: row.get("user_id"),
            role_mapping_id: row.get("role_mapping_id"),
            status: JobStatus::parse(&status),
            error_message: row.get("error_message"),
            vector_query: row.get("vector_query"),
            embedding: embedding.map(|v| v.to_vec()),
            actual_courses: row.get("actual_courses"),
            filtered_courses: row.get("filtered_courses"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, role_mapping_id, status, error_message, \
     vector_query, embedding, actual_courses, filtered_courses, created_at, updated_at";

#[async_trait]
impl RecommendationRepository for PgRecommendationRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Recommendation>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM recommendations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn find_by_role_mapping(
        &self,
        role_mapping_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Recommendation>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM recommendations
             WHERE role_mapping_id = $1 AND user_id = $2
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(role_mapping_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn create_placeholder(
        &self,
        user_id: Uuid,
        role_mapping_id: Uuid,
    ) -> Result<Recommendation> {
        let row = sqlx::query(&format!(
            "INSERT INTO recommendations (id, user_id, role_mapping_id, status,
                 created_at, updated_at)
             VALUES ($1, $2, $3, 'IN_PROGRESS', $4, $4)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(role_mapping_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_row(row)
    }

    async fn complete(
        &self,
        id: Uuid,
        vector_query: &str,
        embedding: &[f32],
        candidates: &[CourseHit],
        courses: &[RankedCourse],
    ) -> Result<()> {
        sqlx::query(
            "UPDATE recommendations
             SET status = 'COMPLETED', vector_query = $2, embedding = $3,
                 actual_courses = $4, filtered_courses = $5,
                 error_message = NULL, updated_at = $6
             WHERE id = $1",
        )
        .bind(id)
        .bind(vector_query)
        .bind(Vector::from(embedding.to_vec()))
        .bind(serde_json::to_value(candidates)?)
        .bind(serde_json::to_value(courses)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn replace_courses(&self, id: Uuid, courses: &JsonValue) -> Result<()> {
        sqlx::query(
            "UPDATE recommendations SET filtered_courses = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(courses)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE recommendations
             SET status = 'FAILED', error_message = $2, updated_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recommendations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
