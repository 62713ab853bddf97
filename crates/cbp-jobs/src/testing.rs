//! In-memory doubles used by pipeline and dispatcher tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use cbp_core::taxonomy::CompetencyTaxonomy;
use cbp_core::{
    CourseHit, CourseMetadata, CourseStore, Document, DocumentFilter, DocumentRepository, Error,
    FracMapping, JobStatus, MappingScope, MetaSummary, MetaSummaryFilter, MetaSummaryRepository,
    NewDocument, RankedCourse, Recommendation, RecommendationRepository, Result, RoleMapping,
    RoleMappingRepository, RoleMappingRequest, StorageBackend,
};
use cbp_inference::MockInferenceBackend;

use crate::context::JobContext;
use crate::dispatcher::Dispatcher;
use crate::spawner::QueueSpawner;

pub const TAXONOMY_JSON: &str = r#"{
    "Behavioral": [
        {"theme": "Leadership", "sub_themes": ["Leading Others"]},
        {"theme": "Communication", "sub_themes": ["Written Communication"]}
    ],
    "Functional": [
        {"theme": "Financial Management", "sub_themes": ["Budgeting"]}
    ]
}"#;

fn scope_matches(scope: &MappingScope, m: &RoleMapping) -> bool {
    m.user_id == scope.user_id
        && m.state_center_id == scope.state_center_id
        && m.department_id == scope.department_id
}

// =============================================================================
// ROLE MAPPINGS
// =============================================================================

#[derive(Default)]
pub struct InMemoryRoleMappings {
    rows: Mutex<Vec<RoleMapping>>,
}

impl InMemoryRoleMappings {
    pub fn all(&self) -> Vec<RoleMapping> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get_row(&self, id: Uuid) -> Option<RoleMapping> {
        self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned()
    }
}

#[async_trait]
impl RoleMappingRepository for InMemoryRoleMappings {
    async fn get(&self, id: Uuid) -> Result<Option<RoleMapping>> {
        Ok(self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_scope(&self, scope: &MappingScope) -> Result<Option<RoleMapping>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| scope_matches(scope, m))
            .cloned())
    }

    async fn list_completed_by_scope(&self, scope: &MappingScope) -> Result<Vec<RoleMapping>> {
        let mut rows: Vec<RoleMapping> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| scope_matches(scope, m) && m.status == JobStatus::Completed)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.sort_order.unwrap_or(i32::MAX));
        Ok(rows)
    }

    async fn create_placeholder(&self, req: &RoleMappingRequest) -> Result<RoleMapping> {
        let now = Utc::now();
        let row = RoleMapping {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            org_type: req.org_type,
            state_center_id: req.state_center_id.clone(),
            department_id: req.department_id.clone(),
            state_center_name: req.state_center_name.clone(),
            department_name: req.department_name.clone(),
            instruction: req.instruction.clone(),
            status: JobStatus::InProgress,
            error_message: None,
            designation_name: "Generating...".to_string(),
            wing_division_section: Some("Generating...".to_string()),
            role_responsibilities: Vec::new(),
            activities: Vec::new(),
            competencies: JsonValue::Array(Vec::new()),
            sort_order: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn apply_generated(&self, id: Uuid, first: &FracMapping) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("role mapping {id}")))?;
        row.status = JobStatus::Completed;
        row.designation_name = first.designation_name.clone();
        row.wing_division_section = first.wing_division_section.clone();
        row.role_responsibilities = first.role_responsibilities.clone();
        row.activities = first.activities.clone();
        row.competencies = serde_json::to_value(&first.competencies)?;
        row.sort_order = Some(first.sort_order);
        row.error_message = None;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_completed(
        &self,
        req: &RoleMappingRequest,
        rest: &[FracMapping],
    ) -> Result<u64> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        for frac in rest {
            rows.push(RoleMapping {
                id: Uuid::new_v4(),
                user_id: req.user_id,
                org_type: req.org_type,
                state_center_id: req.state_center_id.clone(),
                department_id: req.department_id.clone(),
                state_center_name: req.state_center_name.clone(),
                department_name: req.department_name.clone(),
                instruction: req.instruction.clone(),
                status: JobStatus::Completed,
                error_message: None,
                designation_name: frac.designation_name.clone(),
                wing_division_section: frac.wing_division_section.clone(),
                role_responsibilities: frac.role_responsibilities.clone(),
                activities: frac.activities.clone(),
                competencies: serde_json::to_value(&frac.competencies)?,
                sort_order: Some(frac.sort_order),
                created_at: now,
                updated_at: now,
            });
        }
        Ok(rest.len() as u64)
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("role mapping {id}")))?;
        row.status = JobStatus::Failed;
        row.error_message = Some(message.to_string());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_by_scope(&self, scope: &MappingScope) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !scope_matches(scope, m));
        Ok((before - rows.len()) as u64)
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Default)]
pub struct InMemoryDocuments {
    rows: Mutex<Vec<Document>>,
}

impl InMemoryDocuments {
    pub fn insert(&self, doc: Document) {
        self.rows.lock().unwrap().push(doc);
    }

    pub fn all(&self) -> Vec<Document> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get_row(&self, file_id: Uuid) -> Option<Document> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.file_id == file_id)
            .cloned()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocuments {
    async fn create(&self, new: &NewDocument) -> Result<Document> {
        let now = Utc::now();
        let doc = Document {
            file_id: Uuid::new_v4(),
            state_center_id: new.state_center_id.clone(),
            department_id: new.department_id.clone(),
            uploader_id: new.uploader_id,
            filename: new.filename.clone(),
            stored_path: new.stored_path.clone(),
            file_size_bytes: new.file_size_bytes,
            summary_status: JobStatus::NotStarted,
            summary_text: None,
            summary_error: None,
            last_summary_request_id: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, file_id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.file_id == file_id)
            .cloned())
    }

    async fn get_many(&self, file_ids: &[Uuid]) -> Result<Vec<Document>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|d| file_ids.contains(&d.file_id))
            .cloned()
            .collect())
    }

    async fn find_in_scope(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        filename: &str,
        uploader_id: Uuid,
    ) -> Result<Option<Document>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|d| {
                d.state_center_id == state_center_id
                    && d.department_id.as_deref() == department_id
                    && d.filename == filename
                    && d.uploader_id == uploader_id
            })
            .cloned())
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<(i64, Vec<Document>)> {
        let rows: Vec<Document> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                filter
                    .state_center_id
                    .as_ref()
                    .map_or(true, |s| &d.state_center_id == s)
                    && filter
                        .summary_status
                        .map_or(true, |s| d.summary_status == s)
            })
            .cloned()
            .collect();
        let total = rows.len() as i64;
        Ok((total, rows))
    }

    async fn completed_summaries(
        &self,
        uploader_id: Uuid,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Document>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.uploader_id == uploader_id
                    && d.state_center_id == state_center_id
                    && d.department_id.as_deref() == department_id
                    && d.summary_status == JobStatus::Completed
                    && d.summary_text.is_some()
            })
            .cloned()
            .collect())
    }

    async fn set_summary_status(&self, file_id: Uuid, status: JobStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.iter_mut().find(|d| d.file_id == file_id) {
            doc.summary_status = status;
            doc.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_summary_request_id(&self, file_id: Uuid, request_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.iter_mut().find(|d| d.file_id == file_id) {
            doc.last_summary_request_id = Some(request_id);
        }
        Ok(())
    }

    async fn complete_summary(&self, file_id: Uuid, summary_text: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.iter_mut().find(|d| d.file_id == file_id) {
            doc.summary_status = JobStatus::Completed;
            doc.summary_text = Some(summary_text.to_string());
            doc.summary_error = None;
        }
        Ok(())
    }

    async fn fail_summary(&self, file_id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.iter_mut().find(|d| d.file_id == file_id) {
            doc.summary_status = JobStatus::Failed;
            doc.summary_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn reset_summary(&self, file_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.iter_mut().find(|d| d.file_id == file_id) {
            doc.summary_status = JobStatus::NotStarted;
            doc.summary_text = None;
            doc.summary_error = None;
            doc.last_summary_request_id = None;
        }
        Ok(())
    }

    async fn delete(&self, file_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|d| d.file_id != file_id);
        Ok(rows.len() < before)
    }
}

// =============================================================================
// META SUMMARIES
// =============================================================================

#[derive(Default)]
pub struct InMemoryMetaSummaries {
    rows: Mutex<Vec<MetaSummary>>,
}

impl InMemoryMetaSummaries {
    pub fn all(&self) -> Vec<MetaSummary> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get_row(&self, request_id: Uuid) -> Option<MetaSummary> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.request_id == request_id)
            .cloned()
    }
}

#[async_trait]
impl MetaSummaryRepository for InMemoryMetaSummaries {
    async fn create(
        &self,
        state_center_id: &str,
        department_id: Option<&str>,
        file_ids: &[Uuid],
    ) -> Result<MetaSummary> {
        let now = Utc::now();
        let record = MetaSummary {
            request_id: Uuid::new_v4(),
            state_center_id: state_center_id.to_string(),
            department_id: department_id.map(String::from),
            file_ids: file_ids.to_vec(),
            status: JobStatus::Pending,
            summary_text: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<MetaSummary>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.request_id == request_id)
            .cloned())
    }

    async fn list(&self, _filter: &MetaSummaryFilter) -> Result<(i64, Vec<MetaSummary>)> {
        let rows = self.rows.lock().unwrap().clone();
        Ok((rows.len() as i64, rows))
    }

    async fn set_status(&self, request_id: Uuid, status: JobStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(m) = rows.iter_mut().find(|m| m.request_id == request_id) {
            m.status = status;
        }
        Ok(())
    }

    async fn complete(&self, request_id: Uuid, summary_text: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(m) = rows.iter_mut().find(|m| m.request_id == request_id) {
            m.status = JobStatus::Completed;
            m.summary_text = Some(summary_text.to_string());
            m.error_message = None;
        }
        Ok(())
    }

    async fn fail(&self, request_id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(m) = rows.iter_mut().find(|m| m.request_id == request_id) {
            m.status = JobStatus::Failed;
            m.error_message = Some(error.to_string());
        }
        Ok(())
    }

    async fn find_referencing(&self, file_id: Uuid) -> Result<Vec<MetaSummary>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.file_ids.contains(&file_id))
            .cloned()
            .collect())
    }

    async fn replace_file_ids(&self, request_id: Uuid, file_ids: &[Uuid]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(m) = rows.iter_mut().find(|m| m.request_id == request_id) {
            m.file_ids = file_ids.to_vec();
            m.status = JobStatus::Pending;
            m.summary_text = None;
            m.error_message = None;
        }
        Ok(())
    }

    async fn delete(&self, request_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.request_id != request_id);
        Ok(rows.len() < before)
    }
}

// =============================================================================
// RECOMMENDATIONS
// =============================================================================

#[derive(Default)]
pub struct InMemoryRecommendations {
    rows: Mutex<Vec<Recommendation>>,
}

impl InMemoryRecommendations {
    pub fn all(&self) -> Vec<Recommendation> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get_row(&self, id: Uuid) -> Option<Recommendation> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }
}

#[async_trait]
impl RecommendationRepository for InMemoryRecommendations {
    async fn get(&self, id: Uuid) -> Result<Option<Recommendation>> {
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_role_mapping(
        &self,
        role_mapping_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Recommendation>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.role_mapping_id == role_mapping_id && r.user_id == user_id)
            .cloned())
    }

    async fn create_placeholder(
        &self,
        user_id: Uuid,
        role_mapping_id: Uuid,
    ) -> Result<Recommendation> {
        let now = Utc::now();
        let record = Recommendation {
            id: Uuid::new_v4(),
            user_id,
            role_mapping_id,
            status: JobStatus::InProgress,
            error_message: None,
            vector_query: None,
            embedding: None,
            actual_courses: JsonValue::Array(Vec::new()),
            filtered_courses: JsonValue::Array(Vec::new()),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn complete(
        &self,
        id: Uuid,
        vector_query: &str,
        embedding: &[f32],
        candidates: &[CourseHit],
        courses: &[RankedCourse],
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("recommendation {id}")))?;
        record.status = JobStatus::Completed;
        record.vector_query = Some(vector_query.to_string());
        record.embedding = Some(embedding.to_vec());
        record.actual_courses = serde_json::to_value(candidates)?;
        record.filtered_courses = serde_json::to_value(courses)?;
        record.error_message = None;
        Ok(())
    }

    async fn replace_courses(&self, id: Uuid, courses: &JsonValue) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(record) = rows.iter_mut().find(|r| r.id == id) {
            record.filtered_courses = courses.clone();
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(record) = rows.iter_mut().find(|r| r.id == id) {
            record.status = JobStatus::Failed;
            record.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}

// =============================================================================
// COURSE STORE
// =============================================================================

#[derive(Default)]
pub struct StaticCourseStore {
    pub hits: Mutex<Vec<CourseHit>>,
    pub metadata: Mutex<Vec<CourseMetadata>>,
    search_calls: AtomicUsize,
}

impl StaticCourseStore {
    pub fn with_hits(hits: Vec<CourseHit>) -> Self {
        Self {
            hits: Mutex::new(hits),
            ..Default::default()
        }
    }

    pub fn search_call_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CourseStore for StaticCourseStore {
    async fn similarity_search(&self, _embedding: &[f32], limit: i64) -> Result<Vec<CourseHit>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let hits = self.hits.lock().unwrap().clone();
        Ok(hits.into_iter().take(limit as usize).collect())
    }

    async fn metadata_for(&self, identifiers: &[String]) -> Result<Vec<CourseMetadata>> {
        Ok(self
            .metadata
            .lock()
            .unwrap()
            .iter()
            .filter(|m| identifiers.contains(&m.identifier))
            .cloned()
            .collect())
    }
}

// =============================================================================
// STORAGE
// =============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn put(&self, stored_path: &str, data: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(stored_path.to_string(), data.to_vec());
    }

    pub fn remove(&self, stored_path: &str) {
        self.blobs.lock().unwrap().remove(stored_path);
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn save(
        &self,
        data: &[u8],
        filename: &str,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<(String, i64)> {
        let path = format!(
            "{}/{}/{}-{}",
            state_center_id,
            department_id.unwrap_or("_root_"),
            Uuid::new_v4(),
            filename
        );
        self.put(&path, data);
        Ok((path, data.len() as i64))
    }

    async fn read(&self, stored_path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(stored_path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob not found: {stored_path}")))
    }

    async fn delete(&self, stored_path: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().remove(stored_path).is_some())
    }

    async fn exists(&self, stored_path: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(stored_path))
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// Bundle of in-memory infrastructure plus the dispatcher under test.
pub struct Harness {
    pub role_mappings: Arc<InMemoryRoleMappings>,
    pub documents: Arc<InMemoryDocuments>,
    pub meta_summaries: Arc<InMemoryMetaSummaries>,
    pub recommendations: Arc<InMemoryRecommendations>,
    pub courses: Arc<StaticCourseStore>,
    pub storage: Arc<MemoryStorage>,
    pub mock: MockInferenceBackend,
    pub spawner: Arc<QueueSpawner>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new(mock: MockInferenceBackend) -> Self {
        Self::with_courses(mock, StaticCourseStore::default())
    }

    pub fn with_courses(mock: MockInferenceBackend, courses: StaticCourseStore) -> Self {
        let role_mappings = Arc::new(InMemoryRoleMappings::default());
        let documents = Arc::new(InMemoryDocuments::default());
        let meta_summaries = Arc::new(InMemoryMetaSummaries::default());
        let recommendations = Arc::new(InMemoryRecommendations::default());
        let courses = Arc::new(courses);
        let storage = Arc::new(MemoryStorage::default());
        let spawner = Arc::new(QueueSpawner::new());

        let ctx = JobContext {
            role_mappings: role_mappings.clone(),
            documents: documents.clone(),
            meta_summaries: meta_summaries.clone(),
            recommendations: recommendations.clone(),
            courses: courses.clone(),
            generation: Arc::new(mock.clone()),
            embeddings: Arc::new(mock.clone()),
            storage: storage.clone(),
            taxonomy: Arc::new(
                CompetencyTaxonomy::from_json_str(TAXONOMY_JSON).expect("sample taxonomy"),
            ),
        };

        Self {
            dispatcher: Dispatcher::new(ctx, spawner.clone()),
            role_mappings,
            documents,
            meta_summaries,
            recommendations,
            courses,
            storage,
            mock,
            spawner,
        }
    }

    /// Insert a document backed by a real blob.
    pub async fn seed_document(
        &self,
        state_center_id: &str,
        uploader_id: Uuid,
        filename: &str,
    ) -> Document {
        let (stored_path, size) = self
            .storage
            .save(b"%PDF-1.4 test", filename, state_center_id, None)
            .await
            .expect("seed blob");
        self.documents
            .create(&NewDocument {
                state_center_id: state_center_id.to_string(),
                department_id: None,
                uploader_id,
                filename: filename.to_string(),
                stored_path,
                file_size_bytes: size,
            })
            .await
            .expect("seed document")
    }
}
