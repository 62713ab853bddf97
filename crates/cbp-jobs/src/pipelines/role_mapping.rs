//! Two-pass role-mapping generation.
//!
//! Pass 1 extracts the designation hierarchy as strict JSON. Pass 2 fans out
//! FRAC generation over fixed-size designation batches; a failed batch
//! contributes nothing while the others proceed. The first generated mapping
//! overwrites the placeholder row, the rest are bulk-inserted as completed
//! siblings.

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use cbp_core::defaults::FRAC_BATCH_SIZE;
use cbp_core::{
    Designation, DesignationExtraction, Document, Error, FracMapping, GenerationRequest,
    GenerationStage, Result, RoleMappingRequest,
};

use crate::context::JobContext;
use crate::pipelines::failure_message;
use crate::prompts;

/// Failure message recorded when both passes produce nothing usable.
pub const NO_MAPPINGS_MESSAGE: &str = "AI service returned no role mappings.";

/// Pipeline entry point; errors terminate in the job record.
pub async fn run(ctx: JobContext, req: RoleMappingRequest, placeholder_id: Uuid) {
    if let Err(e) = execute(&ctx, &req, placeholder_id).await {
        error!(
            subsystem = "jobs",
            pipeline = "role_mapping",
            placeholder_id = %placeholder_id,
            error = %e,
            "Role-mapping generation failed"
        );
        if let Err(db_err) = ctx
            .role_mappings
            .mark_failed(placeholder_id, &failure_message(&e))
            .await
        {
            error!(
                subsystem = "jobs",
                placeholder_id = %placeholder_id,
                error = %db_err,
                "Could not record role-mapping failure"
            );
        }
    }
}

async fn execute(ctx: &JobContext, req: &RoleMappingRequest, placeholder_id: Uuid) -> Result<()> {
    let summaries = ctx
        .documents
        .completed_summaries(
            req.user_id,
            &req.state_center_id,
            req.department_id.as_deref(),
        )
        .await?;

    let designations = extract_designations(ctx, req, &summaries).await?;
    if designations.is_empty() {
        return Err(Error::Job(NO_MAPPINGS_MESSAGE.to_string()));
    }
    info!(
        subsystem = "jobs",
        pipeline = "role_mapping",
        placeholder_id = %placeholder_id,
        designations = designations.len(),
        "Designation extraction finished"
    );

    let mut mappings = generate_fracs(ctx, req, &designations, &summaries).await;
    if mappings.is_empty() {
        return Err(Error::Job(NO_MAPPINGS_MESSAGE.to_string()));
    }
    mappings.sort_by_key(|m| m.sort_order);

    let first = &mappings[0];
    ctx.role_mappings.apply_generated(placeholder_id, first).await?;
    let siblings = ctx
        .role_mappings
        .insert_completed(req, &mappings[1..])
        .await?;

    info!(
        subsystem = "jobs",
        pipeline = "role_mapping",
        placeholder_id = %placeholder_id,
        total = mappings.len(),
        siblings,
        "Role-mapping generation completed"
    );
    Ok(())
}

/// Pass 1. A shape mismatch in the model output is a hard failure.
async fn extract_designations(
    ctx: &JobContext,
    req: &RoleMappingRequest,
    summaries: &[Document],
) -> Result<Vec<Designation>> {
    let prompt = prompts::designation_extraction(
        req.org_type,
        &req.state_center_name,
        req.department_name.as_deref(),
        req.instruction.as_deref(),
        summaries,
    );
    let raw = ctx
        .generation
        .generate(
            &GenerationRequest::new(GenerationStage::DesignationExtraction, prompt)
                .json_output()
                .with_temperature(0.2),
        )
        .await?;
    let extraction: DesignationExtraction =
        serde_json::from_str(prompts::strip_code_fences(&raw))?;
    Ok(extraction.designations)
}

/// Pass 2 fan-out. Batches run concurrently; a failed batch yields an empty
/// contribution and the others are kept.
async fn generate_fracs(
    ctx: &JobContext,
    req: &RoleMappingRequest,
    designations: &[Designation],
    summaries: &[Document],
) -> Vec<FracMapping> {
    let taxonomy_json = ctx.taxonomy.to_prompt_json();

    let batch_futures = designations
        .chunks(FRAC_BATCH_SIZE)
        .enumerate()
        .map(|(batch_index, batch)| {
            let prompt = prompts::frac_batch(
                req.org_type,
                &req.state_center_name,
                req.department_name.as_deref(),
                batch,
                &taxonomy_json,
                summaries,
            );
            async move {
                match generate_batch(ctx, prompt).await {
                    Ok(mappings) => mappings,
                    Err(e) => {
                        warn!(
                            subsystem = "jobs",
                            pipeline = "role_mapping",
                            batch_index,
                            batch_size = batch.len(),
                            error = %e,
                            "FRAC batch failed; continuing without it"
                        );
                        Vec::new()
                    }
                }
            }
        });

    join_all(batch_futures).await.into_iter().flatten().collect()
}

async fn generate_batch(ctx: &JobContext, prompt: String) -> Result<Vec<FracMapping>> {
    let raw = ctx
        .generation
        .generate(
            &GenerationRequest::new(GenerationStage::FracGeneration, prompt)
                .json_output()
                .with_temperature(0.4),
        )
        .await?;
    let mappings: Vec<FracMapping> = serde_json::from_str(prompts::strip_code_fences(&raw))?;
    Ok(mappings)
}
