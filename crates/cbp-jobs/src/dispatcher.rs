//! Job dispatch and guarded record mutations.
//!
//! The dispatcher is the only component that creates job records and
//! schedules pipelines. It enforces the idempotency contract: per scope (or
//! per key record) at most one pipeline is in flight, completed results are
//! served from the record store, and failed records are wiped before a retry
//! starts clean.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use cbp_core::{
    Document, Error, JobStatus, MetaSummary, Recommendation, Result, RoleMapping,
    RoleMappingRequest,
};

use crate::context::JobContext;
use crate::pipelines::{self, summarize};
use crate::spawner::TaskSpawner;

/// Outcome of a role-mapping submission.
#[derive(Debug)]
pub enum RoleMappingDispatch {
    /// Placeholder created, pipeline scheduled.
    Started(RoleMapping),
    /// A pipeline already owns this scope.
    AlreadyRunning(RoleMapping),
    /// Completed results served from the record store.
    Cached(Vec<RoleMapping>),
}

/// Outcome of a document-summary trigger.
#[derive(Debug)]
pub enum SummaryDispatch {
    Started(Document),
    AlreadyRunning(Document),
    Cached(Document),
}

/// Outcome of a recommendation submission.
#[derive(Debug)]
pub enum RecommendationDispatch {
    Started(Recommendation),
    AlreadyRunning(Recommendation),
    Cached(Recommendation),
}

/// Inputs for a meta-summary submission.
#[derive(Debug, Clone)]
pub struct MetaSummaryRequest {
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub file_ids: Vec<Uuid>,
}

/// Creates job records and schedules their pipelines.
pub struct Dispatcher {
    ctx: JobContext,
    spawner: Arc<dyn TaskSpawner>,
}

impl Dispatcher {
    pub fn new(ctx: JobContext, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self { ctx, spawner }
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    // =========================================================================
    // ROLE MAPPING
    // =========================================================================

    pub async fn submit_role_mapping(
        &self,
        req: RoleMappingRequest,
    ) -> Result<RoleMappingDispatch> {
        let scope = req.scope();
        if let Some(existing) = self.ctx.role_mappings.find_by_scope(&scope).await? {
            match existing.status {
                JobStatus::Completed => {
                    let completed = self
                        .ctx
                        .role_mappings
                        .list_completed_by_scope(&scope)
                        .await?;
                    return Ok(RoleMappingDispatch::Cached(completed));
                }
                JobStatus::Failed => {
                    let removed = self.ctx.role_mappings.delete_by_scope(&scope).await?;
                    info!(
                        subsystem = "jobs",
                        state_center_id = %scope.state_center_id,
                        removed,
                        "Cleared failed role mappings before retry"
                    );
                }
                _ => return Ok(RoleMappingDispatch::AlreadyRunning(existing)),
            }
        }

        let placeholder = self.ctx.role_mappings.create_placeholder(&req).await?;
        let ctx = self.ctx.clone();
        let placeholder_id = placeholder.id;
        self.spawner.schedule(Box::pin(async move {
            pipelines::role_mapping::run(ctx, req, placeholder_id).await;
        }));
        Ok(RoleMappingDispatch::Started(placeholder))
    }

    // =========================================================================
    // DOCUMENT SUMMARY
    // =========================================================================

    pub async fn trigger_document_summary(
        &self,
        file_id: Uuid,
        request_id: Uuid,
    ) -> Result<SummaryDispatch> {
        let document = self
            .ctx
            .documents
            .get(file_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;

        match document.summary_status {
            JobStatus::InProgress => return Ok(SummaryDispatch::AlreadyRunning(document)),
            JobStatus::Completed => return Ok(SummaryDispatch::Cached(document)),
            _ => {}
        }

        // Fail fast when the blob is already gone, before any state change.
        if !self.ctx.storage.exists(&document.stored_path).await? {
            self.ctx
                .documents
                .fail_summary(file_id, summarize::FILE_MISSING_MESSAGE)
                .await?;
            return Err(Error::NotFound(summarize::FILE_MISSING_MESSAGE.to_string()));
        }

        self.ctx
            .documents
            .set_summary_status(file_id, JobStatus::InProgress)
            .await?;
        self.ctx
            .documents
            .set_summary_request_id(file_id, request_id)
            .await?;

        let ctx = self.ctx.clone();
        self.spawner.schedule(Box::pin(async move {
            pipelines::summarize::run(ctx, file_id).await;
        }));

        let updated = self
            .ctx
            .documents
            .get(file_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
        Ok(SummaryDispatch::Started(updated))
    }

    // =========================================================================
    // META SUMMARY
    // =========================================================================

    pub async fn submit_meta_summary(&self, req: MetaSummaryRequest) -> Result<MetaSummary> {
        // Dedup repeated ids, preserving first-seen order.
        let mut file_ids: Vec<Uuid> = Vec::with_capacity(req.file_ids.len());
        for id in &req.file_ids {
            if !file_ids.contains(id) {
                file_ids.push(*id);
            }
        }
        if file_ids.is_empty() {
            return Err(Error::InvalidInput(
                "file_ids must not be empty".to_string(),
            ));
        }

        let documents = self.ctx.documents.get_many(&file_ids).await?;
        if documents.len() != file_ids.len() {
            let found: Vec<Uuid> = documents.iter().map(|d| d.file_id).collect();
            let missing: Vec<String> = file_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(Error::InvalidInput(format!(
                "unknown file_ids: {}",
                missing.join(", ")
            )));
        }
        for doc in &documents {
            if doc.state_center_id != req.state_center_id
                || doc.department_id.as_deref() != req.department_id.as_deref()
            {
                return Err(Error::InvalidInput(format!(
                    "document {} does not belong to the requested scope",
                    doc.file_id
                )));
            }
        }

        let record = self
            .ctx
            .meta_summaries
            .create(&req.state_center_id, req.department_id.as_deref(), &file_ids)
            .await?;

        let ctx = self.ctx.clone();
        let spawner = Arc::clone(&self.spawner);
        let request_id = record.request_id;
        self.spawner.schedule(Box::pin(async move {
            pipelines::meta_summary::run(ctx, spawner, request_id).await;
        }));
        Ok(record)
    }

    // =========================================================================
    // COURSE RECOMMENDATION
    // =========================================================================

    pub async fn submit_recommendation(
        &self,
        user_id: Uuid,
        role_mapping_id: Uuid,
    ) -> Result<RecommendationDispatch> {
        let mapping = self
            .ctx
            .role_mappings
            .get(role_mapping_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("role mapping {role_mapping_id}")))?;
        if mapping.status != JobStatus::Completed {
            return Err(Error::InvalidInput(format!(
                "role mapping {role_mapping_id} is not completed"
            )));
        }

        if let Some(existing) = self
            .ctx
            .recommendations
            .find_by_role_mapping(role_mapping_id, user_id)
            .await?
        {
            match existing.status {
                JobStatus::Completed => return Ok(RecommendationDispatch::Cached(existing)),
                JobStatus::Failed => {
                    self.ctx.recommendations.delete(existing.id).await?;
                }
                _ => return Ok(RecommendationDispatch::AlreadyRunning(existing)),
            }
        }

        let placeholder = self
            .ctx
            .recommendations
            .create_placeholder(user_id, role_mapping_id)
            .await?;
        let ctx = self.ctx.clone();
        let recommendation_id = placeholder.id;
        self.spawner.schedule(Box::pin(async move {
            pipelines::recommend::run(ctx, recommendation_id, role_mapping_id).await;
        }));
        Ok(RecommendationDispatch::Started(placeholder))
    }

    /// Remove one course from a completed recommendation's final list.
    pub async fn remove_course(
        &self,
        recommendation_id: Uuid,
        course_identifier: &str,
    ) -> Result<Recommendation> {
        let record = self
            .ctx
            .recommendations
            .get(recommendation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("recommendation {recommendation_id}")))?;
        if record.status == JobStatus::InProgress {
            return Err(Error::Conflict(
                "recommendation generation is in progress".to_string(),
            ));
        }

        let courses = record
            .filtered_courses
            .as_array()
            .cloned()
            .unwrap_or_default();
        let remaining: Vec<serde_json::Value> = courses
            .iter()
            .filter(|c| {
                c.get("identifier").and_then(|v| v.as_str()) != Some(course_identifier)
            })
            .cloned()
            .collect();
        if remaining.len() == courses.len() {
            return Err(Error::NotFound(format!(
                "course {course_identifier} in recommendation {recommendation_id}"
            )));
        }

        self.ctx
            .recommendations
            .replace_courses(recommendation_id, &serde_json::Value::Array(remaining))
            .await?;
        self.ctx
            .recommendations
            .get(recommendation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("recommendation {recommendation_id}")))
    }

    /// Delete a recommendation record outright. Refused while in flight.
    pub async fn delete_recommendation(&self, recommendation_id: Uuid) -> Result<()> {
        let record = self
            .ctx
            .recommendations
            .get(recommendation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("recommendation {recommendation_id}")))?;
        if record.status == JobStatus::InProgress {
            return Err(Error::PreconditionFailed(
                "recommendation generation is in progress".to_string(),
            ));
        }
        self.ctx.recommendations.delete(recommendation_id).await?;
        Ok(())
    }

    // =========================================================================
    // DOCUMENT DELETION (cascades into meta-summaries)
    // =========================================================================

    /// Delete a document, its blob, and prune it from every meta-summary
    /// that references it. Meta-summaries left with other documents are
    /// reopened and regenerated; ones left empty are deleted.
    pub async fn delete_document(&self, file_id: Uuid) -> Result<()> {
        let document = self
            .ctx
            .documents
            .get(file_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;
        if document.summary_status == JobStatus::InProgress {
            return Err(Error::Conflict(
                "summary generation is in progress".to_string(),
            ));
        }

        let referencing = self.ctx.meta_summaries.find_referencing(file_id).await?;
        for meta in referencing {
            let remaining: Vec<Uuid> = meta
                .file_ids
                .iter()
                .copied()
                .filter(|id| *id != file_id)
                .collect();
            if remaining.is_empty() {
                self.ctx.meta_summaries.delete(meta.request_id).await?;
            } else {
                self.ctx
                    .meta_summaries
                    .replace_file_ids(meta.request_id, &remaining)
                    .await?;
                let ctx = self.ctx.clone();
                let spawner = Arc::clone(&self.spawner);
                let request_id = meta.request_id;
                self.spawner.schedule(Box::pin(async move {
                    pipelines::meta_summary::run(ctx, spawner, request_id).await;
                }));
            }
        }

        if !self.ctx.storage.delete(&document.stored_path).await? {
            warn!(
                subsystem = "jobs",
                file_id = %file_id,
                stored_path = %document.stored_path,
                "Blob already absent during document deletion"
            );
        }
        self.ctx.documents.delete(file_id).await?;
        Ok(())
    }
}
