use std::time::Duration;

use helia_core::generation::{GenerationClient, HttpGenerator, RetryPolicy};
use helia_core::provider::gemini::{GeminiConfig, GeminiProvider};
use helia_core::GenerationError;
use serde_json::json;
use tracing::{Level, info};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils;
use test_utils::setup_tracing;

const STREAM_PATH: &str = "/models/gemini-1.0-pro:streamGenerateContent";

fn client(server: &MockServer, api_key: &str) -> GenerationClient<HttpGenerator<GeminiProvider>> {
    let provider = GeminiProvider::with_config(GeminiConfig::new(api_key, server.uri()));
    GenerationClient::new(HttpGenerator::new(provider)).with_policy(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
    })
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\r\n\r\n"))
        .collect()
}

fn text_event(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn test_streams_fragments_in_order() {
    setup_tracing(Level::DEBUG);
    let server = MockServer::start().await;

    let body = sse(&[
        text_event("Breathe "),
        text_event("in, "),
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "breathe out." }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 6, "totalTokenCount": 18 }
        }),
    ]);

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "User: hi\nAssistant:" }] }],
            "generationConfig": { "topK": 40, "maxOutputTokens": 1024 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut fragments = Vec::new();
    let generation = client(&server, "test-key")
        .generate("User: hi\nAssistant:", |f| fragments.push(f.to_string()))
        .await
        .unwrap();
    info!(?generation, "generated");

    assert_eq!(fragments, vec!["Breathe ", "in, ", "breathe out."]);
    assert_eq!(generation.full_text, "Breathe in, breathe out.");
    assert_eq!(generation.tokens, 6);
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, "test-key")
        .generate("prompt", |_| {})
        .await
        .unwrap_err();

    match err {
        GenerationError::NetworkFailure { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("overloaded"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&[text_event("ok")]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generation = client(&server, "test-key")
        .generate("prompt", |_| {})
        .await
        .unwrap();
    assert_eq!(generation.full_text, "ok");
}

#[tokio::test]
async fn test_rejected_key_is_configuration_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid. Please pass a valid API key.", "status": "PERMISSION_DENIED" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, "bad-key")
        .generate("prompt", |_| {})
        .await
        .unwrap_err();
    assert!(
        matches!(err, GenerationError::MissingConfiguration(_)),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_safety_finish_reason_blocks_response() {
    let server = MockServer::start().await;

    let body = sse(&[json!({
        "candidates": [{ "finishReason": "SAFETY" }]
    })]);
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, "test-key")
        .generate("prompt", |_| {})
        .await
        .unwrap_err();
    assert!(
        matches!(err, GenerationError::ContentSafetyBlocked(_)),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_malformed_event_fails_instead_of_dropping_text() {
    let server = MockServer::start().await;

    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: {}\n\n",
        text_event("Hel"),
        r#"{"candidates":[{"content":{"parts":[{"text":"lo"#,
        text_event("!"),
    );
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut seen = String::new();
    let err = client(&server, "test-key")
        .generate("prompt", |f| seen.push_str(f))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Unknown(_)), "{err:?}");
    assert_eq!(seen, "Hel");
}

#[tokio::test]
async fn test_blocked_prompt() {
    let server = MockServer::start().await;

    let body = sse(&[json!({
        "promptFeedback": { "blockReason": "SAFETY" }
    })]);
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let err = client(&server, "test-key")
        .generate("prompt", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::ContentSafetyBlocked(_)));
}

#[tokio::test]
async fn test_missing_key_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, "   ")
        .generate("prompt", |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingConfiguration(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_network_failure() {
    // nothing listens on the discard port
    let provider = GeminiProvider::with_config(GeminiConfig::new("test-key", "http://127.0.0.1:9"));
    let client = GenerationClient::new(HttpGenerator::new(provider)).with_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
    });

    let err = client.generate("prompt", |_| {}).await.unwrap_err();
    assert!(
        matches!(err, GenerationError::NetworkFailure { attempts: 2, .. }),
        "{err:?}"
    );
}
