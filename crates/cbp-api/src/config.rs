//! Server configuration from environment variables.

use cbp_core::{Error, Result};

/// Blob storage selection.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem root directory.
    Local { root: String },
    /// Authenticated HTTP object store.
    Bucket { base_url: String, token: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub storage: StorageConfig,
    pub taxonomy_path: String,
    /// External course catalog; suggestions are disabled when unset.
    pub catalog_base_url: Option<String>,
    pub catalog_api_key: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".to_string()))?;

        let storage = match std::env::var("CBP_BUCKET_URL") {
            Ok(base_url) => StorageConfig::Bucket {
                base_url,
                token: std::env::var("CBP_BUCKET_TOKEN")
                    .map_err(|_| Error::Config("CBP_BUCKET_TOKEN is not set".to_string()))?,
            },
            Err(_) => StorageConfig::Local {
                root: std::env::var("CBP_STORAGE_ROOT")
                    .unwrap_or_else(|_| "data/uploads".to_string()),
            },
        };

        Ok(Self {
            database_url,
            bind_addr: std::env::var("CBP_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            storage,
            taxonomy_path: std::env::var("CBP_TAXONOMY_PATH")
                .unwrap_or_else(|_| cbp_core::defaults::TAXONOMY_PATH.to_string()),
            catalog_base_url: std::env::var("CBP_CATALOG_URL").ok(),
            catalog_api_key: std::env::var("CBP_CATALOG_API_KEY").ok(),
        })
    }
}
