//! Gemini REST backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cbp_core::{
    EmbeddingBackend, Error, GenerationBackend, GenerationRequest, GenerationStage, Result,
};

use crate::config::GeminiConfig;

/// Gemini inference backend.
///
/// Serves both [`GenerationBackend`] and [`EmbeddingBackend`]; the model is
/// picked per request from the configured stage mapping.
pub struct GeminiBackend {
    client: Client,
    embed_client: Client,
    config: GeminiConfig,
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

// =============================================================================
// BACKEND
// =============================================================================

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gen_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let embed_client = Client::builder()
            .timeout(Duration::from_secs(config.embed_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "inference",
            gen_model = %config.gen_model,
            frac_model = %config.frac_model,
            embed_model = %config.embed_model,
            "Initialized Gemini backend"
        );
        Ok(Self {
            client,
            embed_client,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(request.prompt.clone()),
            inline_data: None,
        }];
        for attachment in &request.attachments {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: attachment.mime_type.clone(),
                    data: BASE64.encode(&attachment.bytes),
                }),
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part {
                    text: Some(s.clone()),
                    inline_data: None,
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                // Search grounding and strict-JSON mode are mutually exclusive
                // on the API; search wins.
                response_mime_type: (request.json_output && !request.web_search)
                    .then(|| "application/json".to_string()),
            },
            tools: if request.web_search {
                vec![Tool {
                    google_search: serde_json::json!({}),
                }]
            } else {
                Vec::new()
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let model = self.config.model_for(request.stage);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&Self::build_request(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "generation request failed with status {status}: {body}"
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("no candidates in response".to_string()))?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" && reason != "MAX_TOKENS" {
                return Err(Error::Inference(format!(
                    "generation blocked: finish_reason={reason}"
                )));
            }
        }

        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Inference("empty generation response".to_string()));
        }

        debug!(
            subsystem = "inference",
            model = %model,
            stage = ?request.stage,
            response_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(text)
    }

    fn model_for(&self, stage: GenerationStage) -> &str {
        self.config.model_for(stage)
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    /// Embed a query. Failures are logged and reported as an empty vector;
    /// callers decide whether an empty embedding is fatal for their job.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.config.base_url, self.config.embed_model, self.config.api_key
        );
        let body = EmbedContentRequest {
            content: Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.to_string()),
                    inline_data: None,
                }],
            },
        };

        let outcome = async {
            let response = self.embed_client.post(&url).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(Error::Embedding(format!(
                    "embedding request failed with status {}",
                    response.status()
                )));
            }
            let parsed: EmbedContentResponse = response.json().await?;
            Ok::<_, Error>(parsed.embedding.values)
        }
        .await;

        match outcome {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    model = %self.config.embed_model,
                    error = %e,
                    "Embedding failed; returning empty vector"
                );
                Ok(Vec::new())
            }
        }
    }
}
