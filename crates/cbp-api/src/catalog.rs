//! External course-catalog client.
//!
//! The catalog expects its query wrapped in a `request` envelope and answers
//! inside a `result.content` envelope; both are unwrapped here so handlers
//! deal in plain course lists.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use cbp_core::{Error, Result};

/// Default page size for catalog searches.
const DEFAULT_LIMIT: i64 = 20;

pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogQuery {
    pub query: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Search live courses by free-text query.
    pub async fn search(&self, query: &CatalogQuery) -> Result<Vec<JsonValue>> {
        let body = json!({
            "request": {
                "filters": {
                    "status": ["Live"],
                    "primaryCategory": ["Course"]
                },
                "fields": ["identifier", "name", "competencies_v6", "duration", "organisation"],
                "sortBy": { "lastUpdatedOn": "desc" },
                "limit": query.limit.unwrap_or(DEFAULT_LIMIT),
                "offset": query.offset.unwrap_or(0),
                "query": query.query
            }
        });

        let response = self
            .client
            .post(format!("{}/api/course/v1/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "catalog search failed with status {}",
                response.status()
            )));
        }

        let payload: JsonValue = response.json().await?;
        let content = payload
            .pointer("/result/content")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();

        debug!(
            subsystem = "api",
            component = "catalog",
            query = %query.query,
            results = content.len(),
            "Catalog search finished"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_unwraps_result_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/course/v1/search"))
            .and(body_partial_json(json!({
                "request": { "query": "procurement" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "content": [
                        { "identifier": "c1", "name": "Procurement 101" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = CatalogClient::new(server.uri(), "key");
        let results = client
            .search(&CatalogQuery {
                query: "procurement".to_string(),
                limit: None,
                offset: None,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["identifier"], "c1");
    }

    #[tokio::test]
    async fn test_search_missing_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        let client = CatalogClient::new(server.uri(), "key");
        let results = client
            .search(&CatalogQuery {
                query: "anything".to_string(),
                limit: Some(5),
                offset: None,
            })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_error_status_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = CatalogClient::new(server.uri(), "key");
        let err = client
            .search(&CatalogQuery {
                query: "anything".to_string(),
                limit: None,
                offset: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
