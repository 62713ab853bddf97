//! Gemini backend configuration.

use cbp_core::{Error, GenerationStage, Result};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default generation model for most stages.
pub const DEFAULT_GEN_MODEL: &str = "gemini-2.0-flash";

/// Default model for the heavier two-pass FRAC generation stage.
pub const DEFAULT_FRAC_MODEL: &str = "gemini-2.5-pro";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

/// Configuration for [`crate::GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model serving summary, vector-query, ranking and discovery stages.
    pub gen_model: String,
    /// Model serving designation extraction and FRAC generation.
    pub frac_model: String,
    pub embed_model: String,
    pub gen_timeout_secs: u64,
    pub embed_timeout_secs: u64,
}

impl GeminiConfig {
    /// Load from environment. `GEMINI_API_KEY` is required; everything else
    /// falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::Config("GEMINI_API_KEY is not set".to_string()))?;

        Ok(Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key,
            gen_model: std::env::var("GEMINI_GEN_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string()),
            frac_model: std::env::var("GEMINI_FRAC_MODEL")
                .unwrap_or_else(|_| DEFAULT_FRAC_MODEL.to_string()),
            embed_model: std::env::var("GEMINI_EMBED_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string()),
            gen_timeout_secs: std::env::var("GEMINI_GEN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(cbp_core::defaults::GEN_TIMEOUT_SECS),
            embed_timeout_secs: std::env::var("GEMINI_EMBED_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(cbp_core::defaults::EMBED_TIMEOUT_SECS),
        })
    }

    /// Model serving the given pipeline stage.
    pub fn model_for(&self, stage: GenerationStage) -> &str {
        match stage {
            GenerationStage::DesignationExtraction | GenerationStage::FracGeneration => {
                &self.frac_model
            }
            _ => &self.gen_model,
        }
    }
}
