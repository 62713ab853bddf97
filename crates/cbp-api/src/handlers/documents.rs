//! Document upload, listing, download, summary and deletion endpoints.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use cbp_core::defaults::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_PDF_BYTES, MAX_UPLOAD_FILES};
use cbp_core::{Document, DocumentFilter, Error, JobStatus, NewDocument};
use cbp_jobs::SummaryDispatch;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// UPLOAD
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct PendingFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Batch upload: each file succeeds or fails on its own, and one bad file
/// never rejects the rest of the batch.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Vec<UploadOutcome>>> {
    let mut state_center_id: Option<String> = None;
    let mut department_id: Option<String> = None;
    let mut uploader_id: Option<Uuid> = None;
    let mut files: Vec<PendingFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "state_center_id" => {
                state_center_id = Some(read_text(field).await?);
            }
            "department_id" => {
                department_id = Some(read_text(field).await?);
            }
            "uploader_id" => {
                let raw = read_text(field).await?;
                uploader_id = Some(
                    Uuid::parse_str(&raw)
                        .map_err(|_| Error::InvalidInput("uploader_id must be a UUID".into()))?,
                );
            }
            "files" => {
                let filename = field
                    .file_name()
                    .map(String::from)
                    .ok_or_else(|| Error::InvalidInput("file field without a filename".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read {filename}: {e}")))?
                    .to_vec();
                files.push(PendingFile { filename, bytes });
            }
            _ => {}
        }
    }

    let state_center_id =
        state_center_id.ok_or_else(|| Error::InvalidInput("state_center_id is required".into()))?;
    let uploader_id =
        uploader_id.ok_or_else(|| Error::InvalidInput("uploader_id is required".into()))?;
    if files.is_empty() {
        return Err(Error::InvalidInput("no files in upload".into()).into());
    }
    if files.len() > MAX_UPLOAD_FILES {
        return Err(
            Error::InvalidInput(format!("at most {MAX_UPLOAD_FILES} files per upload")).into(),
        );
    }

    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let outcome = store_one(
            &state,
            &state_center_id,
            department_id.as_deref(),
            uploader_id,
            &file,
        )
        .await;
        outcomes.push(match outcome {
            Ok(doc) => UploadOutcome {
                filename: file.filename,
                status: "uploaded",
                file_id: Some(doc.file_id),
                error: None,
            },
            Err(e) => UploadOutcome {
                filename: file.filename,
                status: "failed",
                file_id: None,
                error: Some(e.to_string()),
            },
        });
    }
    Ok(Json(outcomes))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, Error> {
    field
        .text()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart field: {e}")))
}

async fn store_one(
    state: &AppState,
    state_center_id: &str,
    department_id: Option<&str>,
    uploader_id: Uuid,
    file: &PendingFile,
) -> Result<Document, Error> {
    if !file.filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(Error::InvalidInput("only PDF files are accepted".into()));
    }
    if file.bytes.len() > MAX_PDF_BYTES {
        return Err(Error::InvalidInput(format!(
            "file exceeds the {} MiB limit",
            MAX_PDF_BYTES / (1024 * 1024)
        )));
    }

    let ctx = state.dispatcher.context();
    if ctx
        .documents
        .find_in_scope(state_center_id, department_id, &file.filename, uploader_id)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(format!(
            "{} already exists in this scope",
            file.filename
        )));
    }

    let (stored_path, file_size_bytes) = ctx
        .storage
        .save(&file.bytes, &file.filename, state_center_id, department_id)
        .await?;
    ctx.documents
        .create(&NewDocument {
            state_center_id: state_center_id.to_string(),
            department_id: department_id.map(String::from),
            uploader_id,
            filename: file.filename.clone(),
            stored_path,
            file_size_bytes,
        })
        .await
}

// =============================================================================
// LISTING AND RETRIEVAL
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state_center_id: Option<String>,
    pub department_id: Option<String>,
    pub filename: Option<String>,
    pub uploader_id: Option<Uuid>,
    pub summary_status: Option<JobStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = DocumentFilter {
        state_center_id: query.state_center_id,
        department_id: query.department_id,
        filename: query.filename,
        uploader_id: query.uploader_id,
        summary_status: query.summary_status,
        skip: query.skip.unwrap_or(0).max(0),
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT),
    };
    let (total, documents) = state.dispatcher.context().documents.list(&filter).await?;
    Ok(Json(json!({ "total": total, "documents": documents })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<Document>> {
    let doc = state
        .dispatcher
        .context()
        .documents
        .get(file_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
    Ok(Json(doc))
}

pub async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Response> {
    let ctx = state.dispatcher.context();
    let doc = ctx
        .documents
        .get(file_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
    let bytes = ctx.storage.read(&doc.stored_path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", doc.filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.dispatcher.delete_document(file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SUMMARY
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub file_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

impl From<Document> for SummaryResponse {
    fn from(doc: Document) -> Self {
        Self {
            file_id: doc.file_id,
            status: doc.summary_status,
            summary_text: doc.summary_text,
            error: doc.summary_error,
            request_id: doc.last_summary_request_id,
        }
    }
}

fn summary_dispatch_response(dispatch: SummaryDispatch) -> (StatusCode, Json<SummaryResponse>) {
    match dispatch {
        SummaryDispatch::Started(doc) | SummaryDispatch::AlreadyRunning(doc) => {
            (StatusCode::ACCEPTED, Json(doc.into()))
        }
        SummaryDispatch::Cached(doc) => (StatusCode::CREATED, Json(doc.into())),
    }
}

/// Kick off (or observe) summarization for a document.
pub async fn trigger_summary(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<SummaryResponse>)> {
    let request_id = Uuid::new_v4();
    let dispatch = state
        .dispatcher
        .trigger_document_summary(file_id, request_id)
        .await?;
    Ok(summary_dispatch_response(dispatch))
}

/// Poll summarization status.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<SummaryResponse>> {
    let doc = state
        .dispatcher
        .context()
        .documents
        .get(file_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
    Ok(Json(doc.into()))
}

/// Drop a stored summary and return the document to `NOT_STARTED`.
pub async fn delete_summary(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ctx = state.dispatcher.context();
    let doc = ctx
        .documents
        .get(file_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
    if doc.summary_status == JobStatus::InProgress {
        return Err(ApiError(Error::Conflict(
            "summary generation is in progress".into(),
        )));
    }
    ctx.documents.reset_summary(file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
