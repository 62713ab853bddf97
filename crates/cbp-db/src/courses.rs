//! Course-metadata vector store.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Row};
use tracing::debug;

use cbp_core::{CourseHit, CourseMetadata, CourseStore, Error, Result};

/// Keyword fallbacks unioned into every similarity search so broadly useful
/// courses stay reachable even when the embedding misses them.
const KEYWORD_FALLBACKS: &[&str] = &["%Communication%", "%GenAI%"];

/// PostgreSQL + pgvector implementation of [`CourseStore`].
pub struct PgCourseStore {
    pool: PgPool,
}

impl PgCourseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseStore for PgCourseStore {
    async fn similarity_search(&self, embedding: &[f32], limit: i64) -> Result<Vec<CourseHit>> {
        let rows = sqlx::query(
            "SELECT name, identifier, score FROM (
                 SELECT name, identifier, 1 - (embedding <=> $1) AS score
                 FROM course_metadata
                 WHERE embedding IS NOT NULL
                 ORDER BY embedding <=> $1
                 LIMIT $2
             ) ranked
             UNION
             SELECT name, identifier, 0.0::float8 AS score
             FROM course_metadata
             WHERE name ILIKE ANY($3)
             ORDER BY score DESC",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .bind(
            KEYWORD_FALLBACKS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let hits: Vec<CourseHit> = rows
            .into_iter()
            .map(|row| CourseHit {
                name: row.get("name"),
                identifier: row.get("identifier"),
                score: row.get("score"),
            })
            .collect();

        debug!(
            subsystem = "courses",
            hits = hits.len(),
            limit,
            "Similarity search finished"
        );
        Ok(hits)
    }

    async fn metadata_for(&self, identifiers: &[String]) -> Result<Vec<CourseMetadata>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT identifier, competencies, duration, organisation
             FROM course_metadata WHERE identifier = ANY($1)",
        )
        .bind(identifiers)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CourseMetadata {
                identifier: row.get("identifier"),
                competencies: row.get("competencies"),
                duration: row.get("duration"),
                organisation: row.get("organisation"),
            })
            .collect())
    }
}
