//! HTTP client behavior against a mock chat-completions endpoint.

use std::time::Duration;

use recipe_board_core::ai::{
    complete_with_retry, AiClient, AiConfig, AiError, ChatMessage, ChatRequest, HttpAiClient,
    RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, timeout: Duration) -> AiConfig {
    AiConfig {
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        base_url: server.uri(),
        timeout,
        max_attempts: 2,
        backoff: Duration::from_millis(1),
        rate_limit_ms: 0,
    }
}

fn client(server: &MockServer) -> HttpAiClient {
    HttpAiClient::new(config(server, Duration::from_secs(5))).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest::json(vec![ChatMessage::user("extract this")])
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

#[tokio::test]
async fn test_sends_model_key_and_json_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .complete("extract_entities", request())
        .await
        .unwrap();
    assert_eq!(response.content, "{\"ok\": true}");
    assert_eq!(response.usage.total_tokens, 17);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
        .mount(&server)
        .await;

    let client = client(&server);
    let policy = RetryPolicy::from(client.config());
    let response = complete_with_retry(&client, "extract_entities", &request(), &policy)
        .await
        .unwrap();

    assert_eq!(response.content, "recovered");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = client(&server);
    let policy = RetryPolicy::from(client.config());
    let err = complete_with_retry(&client, "extract_entities", &request(), &policy)
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Api { status: 401, .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete("extract_entities", request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AiError::RateLimited {
            retry_after_secs: Some(7)
        }
    ));
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete("extract_entities", request())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::ParseError(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_empty_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete("extract_entities", request())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = HttpAiClient::new(config(&server, Duration::from_millis(100))).unwrap();
    let err = client
        .complete("extract_entities", request())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::Timeout(_)));
}
