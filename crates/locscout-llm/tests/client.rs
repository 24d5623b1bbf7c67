//! Integration tests for `ChatClient` using wiremock HTTP mocks.

use locscout_llm::{ChatClient, CompletionRequest, LlmError, TextCompletion};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}}
        ]
    })
}

fn client(server: &MockServer, max_retries: u32) -> ChatClient {
    ChatClient::new(&server.uri(), "test-key", "test-model", 5)
        .expect("client")
        .with_retry(max_retries, 0)
}

#[tokio::test]
async fn complete_returns_first_choice_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, 0)
        .complete(CompletionRequest::new("ping").json())
        .await
        .expect("completion");
    assert_eq!(text, "{\"ok\": true}");
}

#[tokio::test]
async fn per_request_model_override_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": "sonar"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, 0)
        .complete(CompletionRequest::new("ping").with_model("sonar"))
        .await
        .expect("completion");
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("third time")))
        .mount(&server)
        .await;

    let text = client(&server, 3)
        .complete(CompletionRequest::new("ping"))
        .await
        .expect("completion after retries");
    assert_eq!(text, "third time");
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .complete(CompletionRequest::new("ping"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, LlmError::Status { status: 401, ref body } if body == "bad key"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn empty_choices_are_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client(&server, 0)
        .complete(CompletionRequest::new("ping"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse), "unexpected error: {err:?}");
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server, 0)
        .complete(CompletionRequest::new("ping"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Deserialize { .. }), "unexpected error: {err:?}");
}
