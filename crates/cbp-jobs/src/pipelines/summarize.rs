//! Single-document summarization.

use tracing::{error, info};
use uuid::Uuid;

use cbp_core::{Error, GenerationRequest, GenerationStage, Result};

use crate::context::JobContext;
use crate::pipelines::failure_message;
use crate::prompts;

/// Failure message recorded when the blob backing a document is gone.
pub const FILE_MISSING_MESSAGE: &str = "File missing in storage";

/// Pipeline entry point for a document already marked `IN_PROGRESS` by the
/// dispatcher; errors terminate in the record.
pub async fn run(ctx: JobContext, file_id: Uuid) {
    if let Err(e) = execute(&ctx, file_id).await {
        error!(
            subsystem = "jobs",
            pipeline = "summarize",
            file_id = %file_id,
            error = %e,
            "Document summarization failed"
        );
        if let Err(db_err) = ctx
            .documents
            .fail_summary(file_id, &failure_message(&e))
            .await
        {
            error!(
                subsystem = "jobs",
                file_id = %file_id,
                error = %db_err,
                "Could not record summary failure"
            );
        }
    }
}

async fn execute(ctx: &JobContext, file_id: Uuid) -> Result<()> {
    let document = ctx
        .documents
        .get(file_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {file_id}")))?;

    let bytes = match ctx.storage.read(&document.stored_path).await {
        Ok(bytes) => bytes,
        Err(Error::NotFound(_)) => return Err(Error::Job(FILE_MISSING_MESSAGE.to_string())),
        Err(e) => return Err(e),
    };

    let summary = ctx
        .generation
        .generate(
            &GenerationRequest::new(
                GenerationStage::DocumentSummary,
                prompts::document_summary(&document.filename),
            )
            .with_attachment(bytes, "application/pdf")
            .with_temperature(0.3),
        )
        .await?;

    ctx.documents.complete_summary(file_id, &summary).await?;
    info!(
        subsystem = "jobs",
        pipeline = "summarize",
        file_id = %file_id,
        summary_len = summary.len(),
        "Document summarization completed"
    );
    Ok(())
}
