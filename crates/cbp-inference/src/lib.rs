//! # cbp-inference
//!
//! Generation and embedding backends for the CBP pipelines.
//!
//! [`GeminiBackend`] drives the hosted Gemini REST API with per-stage model
//! selection; [`MockInferenceBackend`] is a scripted double used by pipeline
//! tests to exercise every success and failure path without network access.

pub mod config;
pub mod gemini;
pub mod mock;

pub use config::GeminiConfig;
pub use gemini::GeminiBackend;
pub use mock::MockInferenceBackend;
