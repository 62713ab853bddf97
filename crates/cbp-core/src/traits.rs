//! Trait seams between the HTTP layer, pipelines, and infrastructure.
//!
//! Repositories wrap the relational Job Record Store; backends wrap the LLM
//! and embedding providers; [`StorageBackend`] wraps blob storage. Pipelines
//! depend on these traits only, so tests can substitute in-memory doubles
//! and a scripted inference mock.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CourseHit, CourseMetadata, Document, DocumentFilter, FracMapping, JobStatus, MappingScope,
    MetaSummary, MetaSummaryFilter, NewDocument, RankedCourse, Recommendation, RoleMapping,
    RoleMappingRequest,
};

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Role-mapping record store.
#[async_trait]
pub trait RoleMappingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<RoleMapping>>;

    /// Latest record for a scope, any status. Used for the idempotency check.
    async fn find_by_scope(&self, scope: &MappingScope) -> Result<Option<RoleMapping>>;

    /// All completed rows for a scope, ordered by sort_order.
    async fn list_completed_by_scope(&self, scope: &MappingScope) -> Result<Vec<RoleMapping>>;

    /// Insert the placeholder row (`InProgress`, sentinel payload).
    async fn create_placeholder(&self, req: &RoleMappingRequest) -> Result<RoleMapping>;

    /// Phase 1 of materialization: the placeholder becomes the first result.
    async fn apply_generated(&self, id: Uuid, first: &FracMapping) -> Result<()>;

    /// Phase 2 of materialization: bulk-insert sibling rows, already `Completed`.
    async fn insert_completed(&self, req: &RoleMappingRequest, rest: &[FracMapping])
        -> Result<u64>;

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()>;

    /// Clean-slate removal of every row for a scope (failed-retry path).
    async fn delete_by_scope(&self, scope: &MappingScope) -> Result<u64>;
}

/// Document record store.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, new: &NewDocument) -> Result<Document>;

    async fn get(&self, file_id: Uuid) -> Result<Option<Document>>;

    async fn get_many(&self, file_ids: &[Uuid]) -> Result<Vec<Document>>;

    /// Duplicate check: same filename within (state_center, department, uploader).
    async fn find_in_scope(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        filename: &str,
        uploader_id: Uuid,
    ) -> Result<Option<Document>>;

    async fn list(&self, filter: &DocumentFilter) -> Result<(i64, Vec<Document>)>;

    /// Completed summaries for a scope, used as role-mapping pipeline input.
    async fn completed_summaries(
        &self,
        uploader_id: Uuid,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Document>>;

    async fn set_summary_status(&self, file_id: Uuid, status: JobStatus) -> Result<()>;

    async fn set_summary_request_id(&self, file_id: Uuid, request_id: Uuid) -> Result<()>;

    async fn complete_summary(&self, file_id: Uuid, summary_text: &str) -> Result<()>;

    async fn fail_summary(&self, file_id: Uuid, error: &str) -> Result<()>;

    /// Drop summary text/error and return to `NotStarted`.
    async fn reset_summary(&self, file_id: Uuid) -> Result<()>;

    async fn delete(&self, file_id: Uuid) -> Result<bool>;
}

/// Meta-summary record store.
#[async_trait]
pub trait MetaSummaryRepository: Send + Sync {
    async fn create(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        file_ids: &[Uuid],
    ) -> Result<MetaSummary>;

    async fn get(&self, request_id: Uuid) -> Result<Option<MetaSummary>>;

    async fn list(&self, filter: &MetaSummaryFilter) -> Result<(i64, Vec<MetaSummary>)>;

    async fn set_status(&self, request_id: Uuid, status: JobStatus) -> Result<()>;

    async fn complete(&self, request_id: Uuid, summary_text: &str) -> Result<()>;

    async fn fail(&self, request_id: Uuid, error: &str) -> Result<()>;

    /// Meta-summaries whose file_ids contain the given document.
    async fn find_referencing(&self, file_id: Uuid) -> Result<Vec<MetaSummary>>;

    /// Replace the file set and reopen the record (`Pending`, payload cleared).
    async fn replace_file_ids(&self, request_id: Uuid, file_ids: &[Uuid]) -> Result<()>;

    async fn delete(&self, request_id: Uuid) -> Result<bool>;
}

/// Course-recommendation record store.
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Recommendation>>;

    async fn find_by_role_mapping(
        &self,
        role_mapping_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Recommendation>>;

    async fn create_placeholder(&self, user_id: Uuid, role_mapping_id: Uuid)
        -> Result<Recommendation>;

    async fn complete(
        &self,
        id: Uuid,
        vector_query: &str,
        embedding: &[f32],
        candidates: &[CourseHit],
        courses: &[RankedCourse],
    ) -> Result<()>;

    /// Post-completion payload shrink (single-course deletion); status unchanged.
    async fn replace_courses(&self, id: Uuid, courses: &JsonValue) -> Result<()>;

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Course-metadata vector/metadata store.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Ranked similarity hits for the embedding, unioned with fixed keyword
    /// fallbacks so recall never drops to zero.
    async fn similarity_search(&self, embedding: &[f32], limit: i64) -> Result<Vec<CourseHit>>;

    /// Batch metadata lookup; missing identifiers are simply absent.
    async fn metadata_for(&self, identifiers: &[String]) -> Result<Vec<CourseMetadata>>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Binary attachment for multi-part generation (e.g. a PDF document).
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Pipeline stage issuing a generation call; selects the provider model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    DesignationExtraction,
    FracGeneration,
    DocumentSummary,
    MetaSummary,
    VectorQuery,
    CourseRanking,
    CourseDiscovery,
}

/// A single generation request: prompt plus optional system text, binary
/// attachments, JSON-only output mode, and the web-search tool.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: GenerationStage,
    pub prompt: String,
    pub system: Option<String>,
    pub attachments: Vec<Attachment>,
    pub json_output: bool,
    pub web_search: bool,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(stage: GenerationStage, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            prompt: prompt.into(),
            system: None,
            attachments: Vec::new(),
            json_output: false,
            web_search: false,
            temperature: 0.5,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_attachment(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    pub fn json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Backend for text generation (LLM).
///
/// Implementations must raise [`crate::Error::Inference`] on empty or
/// safety-blocked output; callers never receive an empty string.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Model name serving the given stage, for logging.
    fn model_for(&self, stage: GenerationStage) -> &str;
}

/// Backend for query embeddings.
///
/// Contract quirk inherited from the provider adapter: failures yield
/// `Ok(vec![])` rather than an error, and callers must check for emptiness
/// explicitly before using the vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Blob storage for uploaded document bytes.
///
/// Two implementations (local filesystem, remote bucket) satisfy the same
/// contract; stored paths are opaque to callers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist bytes under a scope-derived path; returns (stored_path, size).
    async fn save(
        &self,
        data: &[u8],
        filename: &str,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<(String, i64)>;

    /// Read stored bytes; `Err(Error::NotFound)` if the blob is absent.
    async fn read(&self, stored_path: &str) -> Result<Vec<u8>>;

    /// Delete the blob; `Ok(false)` if it did not exist.
    async fn delete(&self, stored_path: &str) -> Result<bool>;

    async fn exists(&self, stored_path: &str) -> Result<bool>;
}
