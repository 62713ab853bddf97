//! Data models for the CBP backend.
//!
//! Every long-running generation pipeline (role mapping, document summary,
//! meta summary, course recommendation) is backed by a persisted record
//! carrying a [`JobStatus`] and an `error_message`. The record is the durable
//! state machine: the HTTP layer creates it, the background pipeline owns it
//! until a terminal status is written, and clients observe progress by
//! polling it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// JOB STATUS
// =============================================================================

/// Lifecycle status shared by all job-backed records.
///
/// Documents start at `NotStarted`, meta-summaries at `Pending`; role
/// mappings and recommendations are created directly `InProgress` (the
/// placeholder row doubles as the in-flight lock). Transitions never skip
/// `InProgress`, and `Failed` records must be deleted before a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    NotStarted,
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// String form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "NOT_STARTED",
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Parse the database string form. Unknown values map to `Pending`.
    pub fn parse(s: &str) -> Self {
        match s {
            "NOT_STARTED" => JobStatus::NotStarted,
            "PENDING" => JobStatus::Pending,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// True while a pipeline owns the record.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ORGANIZATION SCOPING
// =============================================================================

/// Organization type selecting the prompt variant for FRAC generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgType {
    Ministry,
    State,
}

impl OrgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgType::Ministry => "ministry",
            OrgType::State => "state",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "state" => OrgType::State,
            _ => OrgType::Ministry,
        }
    }
}

/// Logical owner key for role-mapping work: at most one in-flight generation
/// may exist per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingScope {
    pub user_id: Uuid,
    pub state_center_id: String,
    pub department_id: Option<String>,
}

// =============================================================================
// FRAC MAPPING
// =============================================================================

/// A single designation extracted in Pass 1, tagged with its hierarchy
/// position (1 = most senior).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Designation {
    pub sort_order: i32,
    pub designation: String,
}

/// Strict Pass-1 output schema. Parsed with serde; a shape mismatch is a
/// pipeline failure, never silently tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignationExtraction {
    pub designations: Vec<Designation>,
}

/// Competency classification used by FRAC mappings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetencyKind {
    Behavioral,
    Functional,
    Domain,
}

/// One competency tag attached to a designation.
///
/// Behavioral and functional competencies must be sourced verbatim from the
/// fixed taxonomy dataset; domain competencies may be synthesized from
/// context (`source` records which).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competency {
    #[serde(rename = "type")]
    pub kind: CompetencyKind,
    pub theme: String,
    pub sub_theme: String,
    pub source: String,
}

/// One Function/Role/Activity/Competency row produced by Pass 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FracMapping {
    pub designation_name: String,
    #[serde(default)]
    pub wing_division_section: Option<String>,
    #[serde(default)]
    pub role_responsibilities: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    pub sort_order: i32,
    #[serde(default)]
    pub competencies: Vec<Competency>,
    #[serde(default)]
    pub source: Vec<String>,
}

// =============================================================================
// ROLE MAPPING RECORD
// =============================================================================

/// Persisted role-mapping row.
///
/// The first row created for a scope is the placeholder: it is returned to
/// the client immediately (sentinel payload), then overwritten with the
/// first generated FRAC mapping; remaining mappings become sibling rows
/// sharing the same scope, inserted `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMapping {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_type: OrgType,
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub state_center_name: String,
    pub department_name: Option<String>,
    pub instruction: Option<String>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub designation_name: String,
    pub wing_division_section: Option<String>,
    pub role_responsibilities: Vec<String>,
    pub activities: Vec<String>,
    pub competencies: JsonValue,
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inputs needed to create a role-mapping placeholder and run the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMappingRequest {
    pub user_id: Uuid,
    pub org_type: OrgType,
    pub state_center_id: String,
    pub state_center_name: String,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub instruction: Option<String>,
}

impl RoleMappingRequest {
    pub fn scope(&self) -> MappingScope {
        MappingScope {
            user_id: self.user_id,
            state_center_id: self.state_center_id.clone(),
            department_id: self.department_id.clone(),
        }
    }
}

// =============================================================================
// DOCUMENT RECORD
// =============================================================================

/// Persisted uploaded document with its summarization state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_id: Uuid,
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub uploader_id: Uuid,
    pub filename: String,
    pub stored_path: String,
    pub file_size_bytes: i64,
    pub summary_status: JobStatus,
    pub summary_text: Option<String>,
    pub summary_error: Option<String>,
    pub last_summary_request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a freshly uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub uploader_id: Uuid,
    pub filename: String,
    pub stored_path: String,
    pub file_size_bytes: i64,
}

/// Filters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub state_center_id: Option<String>,
    pub department_id: Option<String>,
    pub filename: Option<String>,
    pub uploader_id: Option<Uuid>,
    pub summary_status: Option<JobStatus>,
    pub skip: i64,
    pub limit: i64,
}

// =============================================================================
// META SUMMARY RECORD
// =============================================================================

/// Fan-in record combining several documents' summaries into one narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSummary {
    pub request_id: Uuid,
    pub state_center_id: String,
    pub department_id: Option<String>,
    pub file_ids: Vec<Uuid>,
    pub status: JobStatus,
    pub summary_text: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing meta-summaries.
#[derive(Debug, Clone, Default)]
pub struct MetaSummaryFilter {
    pub state_center_id: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<JobStatus>,
    pub skip: i64,
    pub limit: i64,
}

// =============================================================================
// COURSE RECOMMENDATION RECORD
// =============================================================================

/// Persisted course-recommendation row, keyed by role mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_mapping_id: Uuid,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub vector_query: Option<String>,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    /// Raw similarity-search candidates, as returned by the course store.
    pub actual_courses: JsonValue,
    /// Final merged + ranked + enriched course list.
    pub filtered_courses: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One similarity-search hit from the course store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseHit {
    pub name: String,
    pub identifier: String,
    pub score: f64,
}

/// Catalog metadata used to enrich ranked internal courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub identifier: String,
    pub competencies: Option<JsonValue>,
    pub duration: Option<String>,
    pub organisation: Option<String>,
}

/// One entry of the final recommendation list.
///
/// Internal catalog courses carry the catalog identifier and get enriched
/// with metadata; externally discovered courses are tagged `is_public` with
/// a freshly generated identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCourse {
    #[serde(default)]
    pub identifier: String,
    pub course: String,
    pub relevancy: i64,
    pub rationale: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub competencies: Option<JsonValue>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub organisation: Option<String>,
}
