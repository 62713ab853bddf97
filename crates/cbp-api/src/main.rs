//! cbp-api - HTTP API server for the CBP backend.

mod catalog;
mod config;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cbp_core::defaults::{MAX_PDF_BYTES, MAX_UPLOAD_FILES};
use cbp_core::taxonomy::CompetencyTaxonomy;
use cbp_core::{Result, StorageBackend};
use cbp_db::{
    create_pool, run_migrations, BucketStorageBackend, LocalStorageBackend, PgCourseStore,
    PgDocumentRepository, PgMetaSummaryRepository, PgRecommendationRepository,
    PgRoleMappingRepository,
};
use cbp_inference::GeminiBackend;
use cbp_jobs::{Dispatcher, JobContext, TokioSpawner};

use crate::catalog::CatalogClient;
use crate::config::{ApiConfig, StorageConfig};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "cbp_api=info,cbp_jobs=info,cbp_db=info,cbp_inference=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::Local { root } => {
            info!(subsystem = "api", root = %root, "Using local blob storage");
            Arc::new(LocalStorageBackend::new(root.clone()))
        }
        StorageConfig::Bucket { base_url, token } => {
            info!(subsystem = "api", base_url = %base_url, "Using bucket blob storage");
            Arc::new(BucketStorageBackend::new(base_url.clone(), token.clone()))
        }
    };

    let gemini = Arc::new(GeminiBackend::from_env()?);
    let taxonomy = Arc::new(CompetencyTaxonomy::load(&config.taxonomy_path)?);
    info!(
        subsystem = "api",
        themes = taxonomy.theme_count(),
        "Loaded competency taxonomy"
    );

    let ctx = JobContext {
        role_mappings: Arc::new(PgRoleMappingRepository::new(pool.clone())),
        documents: Arc::new(PgDocumentRepository::new(pool.clone())),
        meta_summaries: Arc::new(PgMetaSummaryRepository::new(pool.clone())),
        recommendations: Arc::new(PgRecommendationRepository::new(pool.clone())),
        courses: Arc::new(PgCourseStore::new(pool.clone())),
        generation: gemini.clone(),
        embeddings: gemini,
        storage,
        taxonomy,
    };
    let dispatcher = Arc::new(Dispatcher::new(ctx, Arc::new(TokioSpawner)));

    let catalog = match (&config.catalog_base_url, &config.catalog_api_key) {
        (Some(base_url), Some(api_key)) => {
            Some(Arc::new(CatalogClient::new(base_url.clone(), api_key.clone())))
        }
        _ => {
            info!(subsystem = "api", "Course catalog not configured; suggestions disabled");
            None
        }
    };

    let app = build_router(AppState {
        dispatcher,
        catalog,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(subsystem = "api", addr = %config.bind_addr, "CBP API listening");
    axum::serve(listener, app)
        .await
        .map_err(cbp_core::Error::Io)?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Documents
        .route("/documents/upload", post(handlers::documents::upload))
        .route("/documents", get(handlers::documents::list))
        .route(
            "/documents/:file_id",
            get(handlers::documents::get).delete(handlers::documents::delete),
        )
        .route(
            "/documents/:file_id/download",
            get(handlers::documents::download),
        )
        .route(
            "/documents/:file_id/summary",
            post(handlers::documents::trigger_summary)
                .get(handlers::documents::get_summary)
                .delete(handlers::documents::delete_summary),
        )
        // Role mappings
        .route(
            "/role-mappings",
            post(handlers::role_mappings::submit)
                .get(handlers::role_mappings::status)
                .delete(handlers::role_mappings::delete),
        )
        // Meta summaries
        .route(
            "/meta-summaries",
            post(handlers::meta_summaries::submit).get(handlers::meta_summaries::list),
        )
        .route(
            "/meta-summaries/:request_id",
            get(handlers::meta_summaries::get).delete(handlers::meta_summaries::delete),
        )
        // Recommendations
        .route(
            "/recommendations",
            post(handlers::recommendations::submit),
        )
        .route(
            "/recommendations/:id",
            get(handlers::recommendations::get).delete(handlers::recommendations::delete),
        )
        .route(
            "/recommendations/:id/courses/:course_identifier",
            delete(handlers::recommendations::remove_course),
        )
        // Catalog suggestions
        .route("/courses/suggestions", get(handlers::recommendations::suggest))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(
            MAX_PDF_BYTES * MAX_UPLOAD_FILES + 1024 * 1024,
        ))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
