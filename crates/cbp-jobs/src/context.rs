//! Shared dependency bundle handed to every pipeline.

use std::sync::Arc;

use cbp_core::taxonomy::CompetencyTaxonomy;
use cbp_core::{
    CourseStore, DocumentRepository, EmbeddingBackend, GenerationBackend, MetaSummaryRepository,
    RecommendationRepository, RoleMappingRepository, StorageBackend,
};

/// Everything a pipeline needs, behind trait objects so tests can swap in
/// in-memory repositories and the scripted inference mock.
#[derive(Clone)]
pub struct JobContext {
    pub role_mappings: Arc<dyn RoleMappingRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub meta_summaries: Arc<dyn MetaSummaryRepository>,
    pub recommendations: Arc<dyn RecommendationRepository>,
    pub courses: Arc<dyn CourseStore>,
    pub generation: Arc<dyn GenerationBackend>,
    pub embeddings: Arc<dyn EmbeddingBackend>,
    pub storage: Arc<dyn StorageBackend>,
    pub taxonomy: Arc<CompetencyTaxonomy>,
}
