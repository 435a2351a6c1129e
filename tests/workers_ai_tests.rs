//! Workers AI client tests against a local HTTP server.

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use workers_ai_openai::config::Config;
use workers_ai_openai::inference::backend::{
    BackendError, ChatBody, ChatMessage, GatewayOptions, InferenceBackend, RunBody, RunOptions,
};
use workers_ai_openai::inference::workers_ai::WorkersAiClient;

const MODEL: &str = "@cf/meta/llama";
const RUN_PATH: &str = "/accounts/acct/ai/run/@cf/meta/llama";

fn client(server: &MockServer) -> WorkersAiClient {
    let mut config = Config::default();
    config.backend.account_id = "acct".to_string();
    config.backend.api_token = "test-token".to_string();
    config.backend.base_url = server.uri();
    config.gateway.base_url = server.uri();
    WorkersAiClient::new(&config)
}

fn chat_body(stream: bool) -> RunBody {
    RunBody::Chat(ChatBody {
        stream,
        messages: vec![ChatMessage::new("user", "Hi")],
        ..Default::default()
    })
}

#[tokio::test]
async fn test_blocking_result_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"response": "Hello"},
            "success": true,
            "errors": [],
            "messages": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .run_blocking(MODEL, &chat_body(false), &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(result.response.as_deref(), Some("Hello"));
    assert!(result.tool_calls.is_none());
}

#[tokio::test]
async fn test_error_status_uses_envelope_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "result": null,
            "success": false,
            "errors": [{"code": 5006, "message": "AiError: Bad input"}],
            "messages": []
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .run_blocking(MODEL, &chat_body(false), &RunOptions::default())
        .await
        .unwrap_err();
    match err {
        BackendError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "AiError: Bad input");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_error_status_without_envelope_keeps_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server)
        .run_streaming(MODEL, &chat_body(true), &RunOptions::default())
        .await
        .err()
        .unwrap();
    match err {
        BackendError::Api { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "bad gateway");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_unsuccessful_envelope_joins_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": null,
            "success": false,
            "errors": [{"message": "first"}, {"message": "second"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .run_blocking(MODEL, &chat_body(false), &RunOptions::default())
        .await
        .unwrap_err();
    match err {
        BackendError::Api { status, message } => {
            assert_eq!(status, 200);
            assert_eq!(message, "first; second");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_result_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let err = client(&server)
        .run_blocking(MODEL, &chat_body(false), &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_streaming_through_gateway() {
    let server = MockServer::start().await;
    let events = "data: {\"response\":\"Hi\"}\n\ndata: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/acct/my-gw/workers-ai/@cf/meta/llama"))
        .and(header("cf-aig-skip-cache", "true"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(events),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = RunOptions {
        gateway: Some(GatewayOptions {
            id: "my-gw".to_string(),
            skip_cache: true,
        }),
    };
    let mut stream = client(&server)
        .run_streaming(MODEL, &chat_body(true), &options)
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(String::from_utf8(received).unwrap(), events);
}
