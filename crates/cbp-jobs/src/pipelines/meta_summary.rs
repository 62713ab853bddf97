//! Meta-summary fan-in.
//!
//! The meta-summary only combines summaries that already exist. Dependencies
//! that are `NOT_STARTED` or `FAILED` get their summarizers re-dispatched as
//! detached tasks, but this run does not wait for them: any dependency short
//! of `COMPLETED` fails the meta record, naming the unfinished files. A
//! later submission (or the document-deletion cascade) picks up from the
//! repaired state.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use cbp_core::{Error, GenerationRequest, GenerationStage, JobStatus, Result};

use crate::context::JobContext;
use crate::pipelines::{failure_message, summarize};
use crate::prompts;
use crate::spawner::TaskSpawner;

/// Pipeline entry point; errors terminate in the job record.
pub async fn run(ctx: JobContext, spawner: Arc<dyn TaskSpawner>, request_id: Uuid) {
    if let Err(e) = execute(&ctx, &spawner, request_id).await {
        error!(
            subsystem = "jobs",
            pipeline = "meta_summary",
            request_id = %request_id,
            error = %e,
            "Meta-summary generation failed"
        );
        if let Err(db_err) = ctx
            .meta_summaries
            .fail(request_id, &failure_message(&e))
            .await
        {
            error!(
                subsystem = "jobs",
                request_id = %request_id,
                error = %db_err,
                "Could not record meta-summary failure"
            );
        }
    }
}

async fn execute(
    ctx: &JobContext,
    spawner: &Arc<dyn TaskSpawner>,
    request_id: Uuid,
) -> Result<()> {
    let record = ctx
        .meta_summaries
        .get(request_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("meta summary {request_id}")))?;
    if matches!(record.status, JobStatus::InProgress | JobStatus::Completed) {
        warn!(
            subsystem = "jobs",
            pipeline = "meta_summary",
            request_id = %request_id,
            status = %record.status,
            "Meta-summary already owned or done; skipping"
        );
        return Ok(());
    }
    ctx.meta_summaries
        .set_status(request_id, JobStatus::InProgress)
        .await?;

    let documents = ctx.documents.get_many(&record.file_ids).await?;
    if documents.len() != record.file_ids.len() {
        return Err(Error::Job(
            "one or more referenced documents no longer exist".to_string(),
        ));
    }

    // Re-kick stalled summarizers, detached; this run does not wait on them.
    let mut unfinished: Vec<&str> = Vec::new();
    for doc in &documents {
        match doc.summary_status {
            JobStatus::Completed => {}
            JobStatus::InProgress => unfinished.push(&doc.filename),
            _ => {
                ctx.documents
                    .set_summary_status(doc.file_id, JobStatus::InProgress)
                    .await?;
                let summarizer_ctx = ctx.clone();
                let file_id = doc.file_id;
                spawner.schedule(Box::pin(async move {
                    summarize::run(summarizer_ctx, file_id).await;
                }));
                unfinished.push(&doc.filename);
            }
        }
    }
    if !unfinished.is_empty() {
        return Err(Error::Job(format!(
            "Document summaries not completed for: {}",
            unfinished.join(", ")
        )));
    }

    let completed: Vec<_> = documents
        .iter()
        .filter(|d| d.summary_text.is_some())
        .cloned()
        .collect();
    if completed.is_empty() {
        return Err(Error::Job(
            "no completed document summaries to combine".to_string(),
        ));
    }

    let summary = ctx
        .generation
        .generate(
            &GenerationRequest::new(
                GenerationStage::MetaSummary,
                prompts::meta_summary(&completed),
            )
            .with_temperature(0.3),
        )
        .await?;

    ctx.meta_summaries.complete(request_id, &summary).await?;
    info!(
        subsystem = "jobs",
        pipeline = "meta_summary",
        request_id = %request_id,
        documents = completed.len(),
        "Meta-summary generation completed"
    );
    Ok(())
}
