use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data_models::{BackendBody, SearchQuery, SearchResponse};
use crate::error::{ConfigError, SearchError};
use crate::security::{SEARCH_ACTION, SecurityGate};

/// The external full-text search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    async fn probe(&self) -> BackendStatus;
}

/// Reachability of the search service as seen by the diagnostic probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackendStatus {
    Reachable { status: u16 },
    Unexpected { status: u16 },
    Unreachable { reason: String },
}

impl BackendStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, BackendStatus::Reachable { .. })
    }
}

/// Talks to `<base>/api/search` over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: Url,
    search_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        search_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<HttpBackend, ConfigError> {
        let endpoint = search_endpoint(base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "SEARCH_API_BASE_URL",
                value: base_url.to_string(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(HttpBackend {
            client,
            endpoint,
            search_timeout,
            probe_timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub fn search_endpoint(base_url: &str) -> Result<Url, ConfigError> {
    let raw = format!("{}/api/search", base_url.trim().trim_end_matches('/'));
    let url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        key: "SEARCH_API_BASE_URL",
        value: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key: "SEARCH_API_BASE_URL",
            value: base_url.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

/// Maps an HTTP status and body from the search service onto the result taxonomy.
pub fn classify(status: StatusCode, body: &str) -> Result<SearchResponse, SearchError> {
    if status != StatusCode::OK {
        return Err(SearchError::Upstream {
            status: status.as_u16(),
        });
    }
    let body: BackendBody =
        serde_json::from_str(body).map_err(SearchError::MalformedResponse)?;
    body.into_response()
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let res = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", query.as_str())])
            .header(ACCEPT, "application/json")
            .timeout(self.search_timeout)
            .send()
            .await
            .map_err(SearchError::Transport)?;

        let status = res.status();
        let body = res.text().await.map_err(SearchError::Transport)?;
        classify(status, &body)
    }

    async fn probe(&self) -> BackendStatus {
        let res = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", "test")])
            .timeout(self.probe_timeout)
            .send()
            .await;

        let status = match res {
            Ok(res) => match res.status() {
                StatusCode::OK | StatusCode::BAD_REQUEST => BackendStatus::Reachable {
                    status: res.status().as_u16(),
                },
                other => BackendStatus::Unexpected {
                    status: other.as_u16(),
                },
            },
            Err(e) => BackendStatus::Unreachable {
                reason: e.to_string(),
            },
        };
        tracing::info!(endpoint = %self.endpoint, ?status, "probed search service");
        status
    }
}

/// Validates, then proxies a query to the search service.
pub struct SearchPipeline {
    gate: Arc<SecurityGate>,
    backend: Arc<dyn SearchBackend>,
}

impl SearchPipeline {
    pub fn new(gate: Arc<SecurityGate>, backend: Arc<dyn SearchBackend>) -> SearchPipeline {
        SearchPipeline { gate, backend }
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    /// The token is checked before anything else; no request leaves this process
    /// for a rejected token or a blank query. There are no retries.
    pub async fn search(&self, query: &str, token: &str) -> Result<SearchResponse, SearchError> {
        self.gate.validate_token(token, SEARCH_ACTION)?;
        let query = SearchQuery::parse(query)?;

        let start = Instant::now();
        let outcome = self.backend.search(&query).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &outcome {
            Ok(response) => tracing::info!(
                query_len = query.as_str().len(),
                results = response.results.len(),
                count = response.count,
                elapsed_ms,
                "search completed"
            ),
            Err(e) => tracing::warn!(
                query_len = query.as_str().len(),
                kind = ?e.kind(),
                elapsed_ms,
                "search failed: {e}"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_base_url() {
        assert_eq!(
            search_endpoint("http://flask-app:5000").unwrap().as_str(),
            "http://flask-app:5000/api/search"
        );
        assert_eq!(
            search_endpoint("https://search.example.com/prefix/").unwrap().as_str(),
            "https://search.example.com/prefix/api/search"
        );
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(search_endpoint("not a url").is_err());
        assert!(search_endpoint("ftp://files.example.com").is_err());
    }

    #[test]
    fn test_classify_non_200() {
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::NOT_FOUND, StatusCode::CREATED] {
            match classify(status, r#"{"results": [], "count": 0}"#) {
                Err(SearchError::Upstream { status: s }) => assert_eq!(s, status.as_u16()),
                other => panic!("expected upstream error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_classify_malformed() {
        for body in ["", "<html>oops</html>", r#"{"results": "many"}"#, r#"{"count": -1}"#] {
            assert!(
                matches!(classify(StatusCode::OK, body), Err(SearchError::MalformedResponse(_))),
                "body {body:?}"
            );
        }
    }

    #[test]
    fn test_classify_success_preserves_order() {
        let body = r#"{"results": [
            {"filename": "z.png", "text_content": "last alphabetically"},
            {"filename": "a.png", "text_content": "first alphabetically"}
        ], "count": 2}"#;
        let response = classify(StatusCode::OK, body).unwrap();
        let names: Vec<&str> = response.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["z.png", "a.png"]);
        assert_eq!(response.count, 2);
    }
}
