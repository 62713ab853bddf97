//! # cbp-db
//!
//! PostgreSQL persistence layer for the CBP backend.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every job-backed record
//! - pgvector similarity search over the course-metadata catalog
//! - Blob storage backends (local filesystem, remote bucket)
//!
//! The database is the only shared mutable resource between request
//! handlers and background pipelines; every status transition is a small
//! single-statement write issued by the record's owning task.

pub mod courses;
pub mod documents;
pub mod meta_summaries;
pub mod pool;
pub mod recommendations;
pub mod role_mappings;
pub mod storage;

// Re-export core types
pub use cbp_core::*;

pub use courses::PgCourseStore;
pub use documents::PgDocumentRepository;
pub use meta_summaries::PgMetaSummaryRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use recommendations::PgRecommendationRepository;
pub use role_mappings::PgRoleMappingRepository;
pub use storage::{BucketStorageBackend, LocalStorageBackend};

/// Run pending schema migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))
}
