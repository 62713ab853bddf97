//! Course recommendation.
//!
//! vector query → embedding → similarity search, then a concurrent pair:
//! catalog ranking (load-bearing; its failure fails the job) and public
//! course discovery (best-effort; its failure contributes an empty list).

use tracing::{error, info, warn};
use uuid::Uuid;

use cbp_core::defaults::VECTOR_SEARCH_LIMIT;
use cbp_core::{
    CourseHit, Error, GenerationRequest, GenerationStage, RankedCourse, Result, RoleMapping,
};

use crate::context::JobContext;
use crate::pipelines::failure_message;
use crate::prompts;

/// Failure message recorded when the embedding provider returns nothing.
pub const EMBEDDING_FAILED_MESSAGE: &str = "Failed to generate embedding for vector query.";

/// Pipeline entry point; errors terminate in the job record.
pub async fn run(ctx: JobContext, recommendation_id: Uuid, role_mapping_id: Uuid) {
    if let Err(e) = execute(&ctx, recommendation_id, role_mapping_id).await {
        error!(
            subsystem = "jobs",
            pipeline = "recommend",
            recommendation_id = %recommendation_id,
            error = %e,
            "Course recommendation failed"
        );
        if let Err(db_err) = ctx
            .recommendations
            .mark_failed(recommendation_id, &failure_message(&e))
            .await
        {
            error!(
                subsystem = "jobs",
                recommendation_id = %recommendation_id,
                error = %db_err,
                "Could not record recommendation failure"
            );
        }
    }
}

async fn execute(ctx: &JobContext, recommendation_id: Uuid, role_mapping_id: Uuid) -> Result<()> {
    let mapping = ctx
        .role_mappings
        .get(role_mapping_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("role mapping {role_mapping_id}")))?;

    let vector_query = ctx
        .generation
        .generate(
            &GenerationRequest::new(
                GenerationStage::VectorQuery,
                prompts::vector_query(&mapping),
            )
            .with_system(prompts::vector_query_system())
            .with_temperature(0.3),
        )
        .await?
        .trim()
        .to_string();

    // The provider adapter reports embedding failure as an empty vector.
    let embedding = ctx.embeddings.embed(&vector_query).await?;
    if embedding.is_empty() {
        return Err(Error::Embedding(EMBEDDING_FAILED_MESSAGE.to_string()));
    }

    let candidates = ctx
        .courses
        .similarity_search(&embedding, VECTOR_SEARCH_LIMIT)
        .await?;

    let (ranked, discovered) = tokio::join!(
        rank_candidates(ctx, &mapping, &candidates),
        discover_public(ctx, &mapping),
    );
    let ranked = ranked?;

    let mut courses = enrich(ctx, ranked).await?;
    courses.extend(discovered);
    courses.sort_by_key(|c| std::cmp::Reverse(c.relevancy));

    ctx.recommendations
        .complete(
            recommendation_id,
            &vector_query,
            &embedding,
            &candidates,
            &courses,
        )
        .await?;
    info!(
        subsystem = "jobs",
        pipeline = "recommend",
        recommendation_id = %recommendation_id,
        candidates = candidates.len(),
        courses = courses.len(),
        "Course recommendation completed"
    );
    Ok(())
}

/// Catalog ranking; failure propagates and fails the job.
async fn rank_candidates(
    ctx: &JobContext,
    mapping: &RoleMapping,
    candidates: &[CourseHit],
) -> Result<Vec<RankedCourse>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let candidates_json = serde_json::to_string_pretty(candidates)?;
    let raw = ctx
        .generation
        .generate(
            &GenerationRequest::new(
                GenerationStage::CourseRanking,
                prompts::course_ranking(mapping, &candidates_json),
            )
            .with_system(prompts::course_ranking_system())
            .json_output()
            .with_temperature(0.2),
        )
        .await?;
    let ranked: Vec<RankedCourse> = serde_json::from_str(prompts::strip_code_fences(&raw))?;
    Ok(ranked)
}

/// Public-web discovery; best-effort, failure yields an empty list.
async fn discover_public(ctx: &JobContext, mapping: &RoleMapping) -> Vec<RankedCourse> {
    let outcome = async {
        let raw = ctx
            .generation
            .generate(
                &GenerationRequest::new(
                    GenerationStage::CourseDiscovery,
                    prompts::public_discovery(mapping),
                )
                .with_system(prompts::public_discovery_system())
                .with_web_search()
                .with_temperature(0.4),
            )
            .await?;
        let discovered: Vec<RankedCourse> =
            serde_json::from_str(prompts::strip_code_fences(&raw))?;
        Ok::<_, Error>(discovered)
    }
    .await;

    match outcome {
        Ok(mut discovered) => {
            for course in &mut discovered {
                course.is_public = true;
                course.identifier = Uuid::new_v4().to_string();
            }
            discovered
        }
        Err(e) => {
            warn!(
                subsystem = "jobs",
                pipeline = "recommend",
                error = %e,
                "Public course discovery failed; continuing without it"
            );
            Vec::new()
        }
    }
}

/// Attach catalog metadata to internally ranked courses; unknown identifiers
/// simply stay unenriched.
async fn enrich(ctx: &JobContext, ranked: Vec<RankedCourse>) -> Result<Vec<RankedCourse>> {
    let identifiers: Vec<String> = ranked
        .iter()
        .filter(|c| !c.identifier.is_empty())
        .map(|c| c.identifier.clone())
        .collect();
    let metadata = ctx.courses.metadata_for(&identifiers).await?;

    Ok(ranked
        .into_iter()
        .map(|mut course| {
            if let Some(meta) = metadata.iter().find(|m| m.identifier == course.identifier) {
                course.competencies = meta.competencies.clone();
                course.duration = meta.duration.clone();
                course.organisation = meta.organisation.clone();
            }
            course
        })
        .collect())
}
