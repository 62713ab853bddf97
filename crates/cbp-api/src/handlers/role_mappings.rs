//! Role-mapping generation endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cbp_core::{Error, JobStatus, MappingScope, OrgType, RoleMapping, RoleMappingRequest};
use cbp_jobs::RoleMappingDispatch;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Uuid,
    pub org_type: OrgType,
    pub state_center_id: String,
    pub state_center_name: String,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub instruction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: JobStatus,
    pub role_mappings: Vec<RoleMapping>,
}

fn dispatch_response(dispatch: RoleMappingDispatch) -> (StatusCode, Json<SubmitResponse>) {
    match dispatch {
        RoleMappingDispatch::Started(placeholder) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                status: JobStatus::InProgress,
                role_mappings: vec![placeholder],
            }),
        ),
        RoleMappingDispatch::AlreadyRunning(existing) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                status: JobStatus::InProgress,
                role_mappings: vec![existing],
            }),
        ),
        RoleMappingDispatch::Cached(rows) => (
            StatusCode::CREATED,
            Json(SubmitResponse {
                status: JobStatus::Completed,
                role_mappings: rows,
            }),
        ),
    }
}

/// Submit a role-mapping generation. Idempotent per scope: an in-flight
/// generation is reported as-is and a completed one is served from the
/// record store.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let request = RoleMappingRequest {
        user_id: req.user_id,
        org_type: req.org_type,
        state_center_id: req.state_center_id,
        state_center_name: req.state_center_name,
        department_id: req.department_id,
        department_name: req.department_name,
        instruction: req.instruction,
    };
    let dispatch = state.dispatcher.submit_role_mapping(request).await?;
    Ok(dispatch_response(dispatch))
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub user_id: Uuid,
    pub state_center_id: String,
    pub department_id: Option<String>,
}

impl ScopeQuery {
    fn scope(&self) -> MappingScope {
        MappingScope {
            user_id: self.user_id,
            state_center_id: self.state_center_id.clone(),
            department_id: self.department_id.clone(),
        }
    }
}

/// Poll a scope: current status plus completed rows.
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<SubmitResponse>> {
    let ctx = state.dispatcher.context();
    let scope = query.scope();
    let head = ctx
        .role_mappings
        .find_by_scope(&scope)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no role mappings for scope {}",
                scope.state_center_id
            ))
        })?;

    let role_mappings = if head.status == JobStatus::Completed {
        ctx.role_mappings.list_completed_by_scope(&scope).await?
    } else {
        vec![head.clone()]
    };
    Ok(Json(SubmitResponse {
        status: head.status,
        role_mappings,
    }))
}

/// Delete every role-mapping row for a scope. Refused while a generation is
/// in flight.
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<StatusCode> {
    let ctx = state.dispatcher.context();
    let scope = query.scope();
    if let Some(head) = ctx.role_mappings.find_by_scope(&scope).await? {
        if head.status == JobStatus::InProgress {
            return Err(ApiError(Error::Conflict(
                "role-mapping generation is in progress".into(),
            )));
        }
    } else {
        return Err(ApiError(Error::NotFound(format!(
            "no role mappings for scope {}",
            scope.state_center_id
        ))));
    }
    ctx.role_mappings.delete_by_scope(&scope).await?;
    Ok(StatusCode::NO_CONTENT)
}
