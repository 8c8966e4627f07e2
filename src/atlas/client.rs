//! Cognitive Atlas API client.

use crate::models::TaskSummary;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("cannot connect to Cognitive Atlas at {0}")]
    Connect(String),

    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cognitive Atlas API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Client for the Cognitive Atlas REST API.
pub struct AtlasClient {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl AtlasClient {
    /// Create a client for `base_url` (e.g. `https://www.cognitiveatlas.org/api/v-alpha`).
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, AtlasError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("hedtask/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    /// Fetch the list of all tasks.
    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>, AtlasError> {
        let url = format!("{}/task", self.base_url);
        let value = self.get_json(&url, &[]).await?;

        serde_json::from_value(value).map_err(|e| AtlasError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Fetch the full record for one task.
    ///
    /// Returns `Ok(None)` when the API answers with an empty document.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<Value>, AtlasError> {
        let url = format!("{}/task", self.base_url);
        let value = self.get_json(&url, &[("id", task_id)]).await?;
        Ok(task_document(value))
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, AtlasError> {
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AtlasError::Timeout {
                        url: url.to_string(),
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    AtlasError::Connect(self.base_url.clone())
                } else {
                    AtlasError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AtlasError::Status { status, body });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| AtlasError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Normalize a single-task response: empty documents mean "no details",
/// and a one-element array is unwrapped.
fn task_document(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(ref map) if map.is_empty() => None,
        Value::Array(items) => items.into_iter().next().and_then(task_document),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_task_document_normalization() {
        assert_eq!(task_document(Value::Null), None);
        assert_eq!(task_document(json!({})), None);
        assert_eq!(task_document(json!([])), None);
        assert_eq!(
            task_document(json!([{"id": "trm_a"}])),
            Some(json!({"id": "trm_a"}))
        );
        assert_eq!(
            task_document(json!({"id": "trm_a"})),
            Some(json!({"id": "trm_a"}))
        );
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/task");
                then.status(200).json_body(json!([
                    {"id": "trm_a", "name": "Stroop task", "definition_text": "Name the ink color"},
                    {"id": "trm_b", "name": "Go/no-go", "extra_field": 1},
                    {"name": "No id"}
                ]));
            })
            .await;

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let tasks = client.list_tasks().await.unwrap();

        mock.assert_async().await;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].id.as_deref(), Some("trm_a"));
        assert_eq!(tasks[1].definition_text, None);
        assert_eq!(tasks[2].id, None);
    }

    #[tokio::test]
    async fn test_get_task_by_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task").query_param("id", "trm_a");
                then.status(200)
                    .json_body(json!({"id": "trm_a", "citation": [{"citation_pmid": "1"}]}));
            })
            .await;

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let task = client.get_task("trm_a").await.unwrap().unwrap();
        assert_eq!(task["citation"][0]["citation_pmid"], "1");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task");
                then.status(500).body("boom");
            })
            .await;

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let err = client.get_task("trm_a").await.unwrap_err();
        assert!(matches!(err, AtlasError::Status { .. }));
    }

    #[tokio::test]
    async fn test_empty_body_is_no_details() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task");
                then.status(200).body("");
            })
            .await;

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        assert_eq!(client.get_task("trm_a").await.unwrap(), None);
    }
}
