//! Contract tests for the proxy hop against a mock search service.

use chrono::Duration as TokenAge;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use text_search::error::{SearchError, SecurityError};
use text_search::pipeline::{BackendStatus, HttpBackend, SearchBackend, SearchPipeline};
use text_search::security::{AntiForgeryToken, PageContext, SEARCH_ACTION, SecurityGate};

mod test_helpers {
    use super::*;

    pub fn backend(uri: &str) -> HttpBackend {
        HttpBackend::new(uri, Duration::from_secs(30), Duration::from_secs(5)).unwrap()
    }

    pub fn pipeline(uri: &str) -> (SearchPipeline, AntiForgeryToken) {
        let gate = Arc::new(SecurityGate::new(b"pipeline-tests", TokenAge::hours(1)));
        let token = gate.issue_token(&PageContext::new(), SEARCH_ACTION);
        let pipeline = SearchPipeline::new(gate, Arc::new(backend(uri)));
        (pipeline, token)
    }
}

use test_helpers::*;

#[cfg(test)]
mod search_success {
    use super::*;

    #[tokio::test]
    async fn test_results_are_passed_through_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "invoice"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"filename": "b.png", "text_content": "second invoice", "image_url": "http://s3/b.png"},
                    {"filename": "a.png", "text_content": "first invoice", "extracted_at": "2024-01-15T10:30:00"}
                ],
                "count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let response = pipeline.search("  invoice ", token.as_str()).await.unwrap();

        assert_eq!(response.count, 2);
        assert_eq!(response.results[0].filename, "b.png");
        assert_eq!(response.results[0].image_url.as_deref(), Some("http://s3/b.png"));
        assert_eq!(response.results[1].filename, "a.png");
        assert!(response.results[1].extracted_at.is_some());
    }

    #[tokio::test]
    async fn test_query_is_url_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "cats & dogs?=#"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "count": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let response = pipeline.search("cats & dogs?=#", token.as_str()).await.unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let response = pipeline.search("anything", token.as_str()).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.count, 0);
    }
}

#[cfg(test)]
mod search_rejections {
    use super::*;

    #[tokio::test]
    async fn test_bad_token_never_reaches_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "count": 0})))
            .expect(0)
            .mount(&server)
            .await;

        let (pipeline, _) = pipeline(&server.uri());
        for token in ["", "garbage", "abc.123.AAAA"] {
            let err = pipeline.search("invoice", token).await.unwrap_err();
            assert!(matches!(err, SearchError::Security(_)), "token {token:?} gave {err:?}");
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_security_checked_before_query() {
        let server = MockServer::start().await;
        let (pipeline, _) = pipeline(&server.uri());
        let err = pipeline.search("   ", "").await.unwrap_err();
        assert!(matches!(err, SearchError::Security(SecurityError::Missing)));
    }

    #[tokio::test]
    async fn test_blank_queries_never_reach_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        for query in ["", " ", "\t\n  ", "<p></p>"] {
            let err = pipeline.search(query, token.as_str()).await.unwrap_err();
            assert!(matches!(err, SearchError::Validation(_)), "query {query:?} gave {err:?}");
        }
    }
}

#[cfg(test)]
mod search_failures {
    use super::*;

    #[tokio::test]
    async fn test_status_500_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"results": [{"filename": "x", "text_content": "leak"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let err = pipeline.search("invoice", token.as_str()).await.unwrap_err();
        assert!(matches!(err, SearchError::Upstream { status: 500 }));
        assert_eq!(err.user_message(), "Search service returned error: 500");
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let err = pipeline.search("invoice", token.as_str()).await.unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));
        assert_eq!(err.user_message(), "Invalid response from search service");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": [{"name": "no filename"}], "count": 1})),
            )
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let err = pipeline.search("invoice", token.as_str()).await.unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_error_field_is_domain_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Search index is rebuilding"})),
            )
            .mount(&server)
            .await;

        let (pipeline, token) = pipeline(&server.uri());
        let err = pipeline.search("invoice", token.as_str()).await.unwrap_err();
        assert!(matches!(&err, SearchError::Domain(m) if m == "Search index is rebuilding"));
        assert_eq!(err.user_message(), "Search index is rebuilding");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is not served in test environments.
        let (pipeline, token) = pipeline("http://127.0.0.1:9");
        let err = pipeline.search("invoice", token.as_str()).await.unwrap_err();
        assert!(matches!(err, SearchError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": [], "count": 0}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let gate = Arc::new(SecurityGate::new(b"timeouts", TokenAge::hours(1)));
        let token = gate.issue_token(&PageContext::new(), SEARCH_ACTION);
        let backend =
            HttpBackend::new(&server.uri(), Duration::from_millis(200), Duration::from_secs(1)).unwrap();
        let pipeline = SearchPipeline::new(gate, Arc::new(backend));

        match pipeline.search("invoice", token.as_str()).await {
            Err(SearchError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod probe {
    use super::*;

    async fn probe_with_status(status: u16) -> BackendStatus {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "test"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;
        backend(&server.uri()).probe().await
    }

    #[tokio::test]
    async fn test_ok_and_bad_request_are_reachable() {
        assert_eq!(probe_with_status(200).await, BackendStatus::Reachable { status: 200 });
        assert_eq!(probe_with_status(400).await, BackendStatus::Reachable { status: 400 });
    }

    #[tokio::test]
    async fn test_other_status_is_unexpected() {
        let status = probe_with_status(503).await;
        assert_eq!(status, BackendStatus::Unexpected { status: 503 });
        assert!(!status.is_reachable());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let status = backend("http://127.0.0.1:9").probe().await;
        assert!(matches!(status, BackendStatus::Unreachable { .. }));
    }
}
