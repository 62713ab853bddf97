//! Default tunables for the CBP backend.
//!
//! Values mirror the production deployment; most can be overridden through
//! environment variables read by the respective config structs.

/// Designations per Pass-2 FRAC batch. Keeps each LLM call inside output
/// token and latency budgets.
pub const FRAC_BATCH_SIZE: usize = 30;

/// Minimum behavioral competencies per designation (prompt contract).
pub const MIN_BEHAVIORAL_COMPETENCIES: usize = 4;

/// Minimum functional competencies per designation (prompt contract).
pub const MIN_FUNCTIONAL_COMPETENCIES: usize = 4;

/// Minimum domain competencies per designation (prompt contract).
pub const MIN_DOMAIN_COMPETENCIES: usize = 6;

/// Similarity-search candidate cap before keyword fallbacks are unioned in.
pub const VECTOR_SEARCH_LIMIT: i64 = 20;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 60;

/// Maximum files per batch upload.
pub const MAX_UPLOAD_FILES: usize = 10;

/// Maximum uploaded PDF size in bytes (25 MiB).
pub const MAX_PDF_BYTES: usize = 25 * 1024 * 1024;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Hard page-size cap for list endpoints.
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Path to the competency taxonomy dataset.
pub const TAXONOMY_PATH: &str = "data/competencies.json";
