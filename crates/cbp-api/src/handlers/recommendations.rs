//! Course-recommendation and catalog-suggestion endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cbp_core::{Error, Recommendation};
use cbp_jobs::RecommendationDispatch;

use crate::catalog::CatalogQuery;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Uuid,
    pub role_mapping_id: Uuid,
}

fn dispatch_response(dispatch: RecommendationDispatch) -> (StatusCode, Json<Recommendation>) {
    match dispatch {
        RecommendationDispatch::Started(r) | RecommendationDispatch::AlreadyRunning(r) => {
            (StatusCode::ACCEPTED, Json(r))
        }
        RecommendationDispatch::Cached(r) => (StatusCode::CREATED, Json(r)),
    }
}

/// Submit a recommendation. Idempotent per role mapping and user.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Recommendation>)> {
    let dispatch = state
        .dispatcher
        .submit_recommendation(req.user_id, req.role_mapping_id)
        .await?;
    Ok(dispatch_response(dispatch))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Recommendation>> {
    let record = state
        .dispatcher
        .context()
        .recommendations
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("recommendation {id}")))?;
    Ok(Json(record))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.dispatcher.delete_recommendation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a single course from a completed recommendation.
pub async fn remove_course(
    State(state): State<AppState>,
    Path((id, course_identifier)): Path<(Uuid, String)>,
) -> ApiResult<Json<Recommendation>> {
    let updated = state
        .dispatcher
        .remove_course(id, &course_identifier)
        .await?;
    Ok(Json(updated))
}

// =============================================================================
// CATALOG SUGGESTIONS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub query: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Free-text course search against the external catalog.
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let catalog = state.catalog.as_ref().ok_or_else(|| {
        ApiError(Error::Config(
            "course catalog is not configured".to_string(),
        ))
    })?;
    if query.query.trim().is_empty() {
        return Err(ApiError(Error::InvalidInput(
            "query must not be empty".into(),
        )));
    }
    let courses = catalog
        .search(&CatalogQuery {
            query: query.query,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Json(json!({ "courses": courses })))
}
