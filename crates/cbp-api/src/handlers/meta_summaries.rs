//! Meta-summary endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cbp_core::defaults::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use cbp_core::{Error, JobStatus, MetaSummary, MetaSummaryFilter};
use cbp_jobs::MetaSummaryRequest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub file_ids: Vec<Uuid>,
}

pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<MetaSummary>)> {
    let record = state
        .dispatcher
        .submit_meta_summary(MetaSummaryRequest {
            state_center_id: req.state_center_id,
            department_id: req.department_id,
            file_ids: req.file_ids,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<MetaSummary>> {
    let record = state
        .dispatcher
        .context()
        .meta_summaries
        .get(request_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("meta summary {request_id}")))?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state_center_id: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<JobStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = MetaSummaryFilter {
        state_center_id: query.state_center_id,
        department_id: query.department_id,
        status: query.status,
        skip: query.skip.unwrap_or(0).max(0),
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT),
    };
    let (total, summaries) = state
        .dispatcher
        .context()
        .meta_summaries
        .list(&filter)
        .await?;
    Ok(Json(json!({ "total": total, "meta_summaries": summaries })))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ctx = state.dispatcher.context();
    let record = ctx
        .meta_summaries
        .get(request_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("meta summary {request_id}")))?;
    if record.status == JobStatus::InProgress {
        return Err(ApiError(Error::Conflict(
            "meta-summary generation is in progress".into(),
        )));
    }
    ctx.meta_summaries.delete(request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
