//! Mock inference backend for deterministic pipeline testing.
//!
//! Scripted responses are matched by prompt substring first, then drained
//! from a FIFO queue, then the default response. Individual calls can be
//! scripted to fail by zero-based call index, and embeddings (including the
//! empty-vector failure contract) are fully configurable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cbp_core::{
    EmbeddingBackend, Error, GenerationBackend, GenerationRequest, GenerationStage, Result,
};

/// One logged backend call, for test assertions.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub system: Option<String>,
}

#[derive(Default)]
struct MockState {
    mapped_responses: Vec<(String, String)>,
    queued_responses: VecDeque<String>,
    failing_generate_calls: Vec<usize>,
    generate_seen: usize,
    embedding: Option<Vec<f32>>,
    call_log: Vec<MockCall>,
}

/// Scripted generation + embedding double.
#[derive(Clone, Default)]
pub struct MockInferenceBackend {
    state: Arc<Mutex<MockState>>,
    default_response: String,
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            default_response: "Mock response".to_string(),
        }
    }

    /// Response for generate calls with no mapping or queued entry.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Respond with `output` whenever the prompt contains `needle`.
    pub fn with_response_for(self, needle: impl Into<String>, output: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .mapped_responses
            .push((needle.into(), output.into()));
        self
    }

    /// Push a response onto the FIFO queue consulted after substring maps.
    pub fn push_response(self, output: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .queued_responses
            .push_back(output.into());
        self
    }

    /// Fail the Nth generate call (zero-based) with an inference error.
    pub fn fail_generate_call(self, index: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_generate_calls
            .push(index);
        self
    }

    /// Fixed embedding returned by every embed call.
    pub fn with_embedding(self, embedding: Vec<f32>) -> Self {
        self.state.lock().unwrap().embedding = Some(embedding);
        self
    }

    /// Script the empty-vector embedding failure contract.
    pub fn with_failing_embedding(self) -> Self {
        self.with_embedding(Vec::new())
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().call_log.clone()
    }

    pub fn generate_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "generate")
            .count()
    }

    pub fn embed_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "embed")
            .count()
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let index = state.generate_seen;
        state.generate_seen += 1;
        state.call_log.push(MockCall {
            operation: "generate".to_string(),
            input: request.prompt.clone(),
            system: request.system.clone(),
        });

        if state.failing_generate_calls.contains(&index) {
            return Err(Error::Inference(format!(
                "scripted failure for call {index}"
            )));
        }

        if let Some((_, output)) = state
            .mapped_responses
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
        {
            return Ok(output.clone());
        }
        if let Some(output) = state.queued_responses.pop_front() {
            return Ok(output);
        }
        Ok(self.default_response.clone())
    }

    fn model_for(&self, _stage: GenerationStage) -> &str {
        "mock-model"
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut state = self.state.lock().unwrap();
        state.call_log.push(MockCall {
            operation: "embed".to_string(),
            input: text.to_string(),
            system: None,
        });
        Ok(state.embedding.clone().unwrap_or_else(|| vec![0.1; 768]))
    }
}
