use std::sync::Arc;
use std::time::Duration;

use conclave::gateway::openrouter::{ChatProvider, OpenRouterAdapter, MAX_INPUT_CHARS};
use conclave::gateway::{
    Attribution, ChatGateway, ChatModel, ChatRequest, FinishReason, Message, NoopUsageSink,
    ProviderError, ProviderGateway,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_request() -> ChatRequest {
    ChatRequest::new(
        ChatModel::openrouter("openai/gpt-5.1-chat"),
        vec![Message::user("hi")],
        Attribution::new("test"),
    )
}

async fn adapter_for(server: &MockServer) -> OpenRouterAdapter {
    OpenRouterAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5), None, None)
        .unwrap()
}

#[tokio::test]
async fn openrouter_parses_success_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "hello" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 20 }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let resp = adapter.chat(&chat_request()).await.unwrap();

    assert_eq!(resp.content, "hello");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 10);
    assert_eq!(resp.output_tokens, 20);
}

#[tokio::test]
async fn openrouter_detects_refusal_from_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "I cannot comply with that request." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let err = adapter.chat(&chat_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Refused { .. }));
}

#[tokio::test]
async fn openrouter_classifies_http_429_and_keeps_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-request-id", "abc123")
                .set_body_json(json!({
                    "error": { "message": "rate limited", "code": "rate_limit_exceeded" }
                })),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let err = adapter.chat(&chat_request()).await.unwrap_err();
    match err {
        ProviderError::RateLimited {
            retry_after,
            context,
        } => {
            assert_eq!(retry_after, Duration::from_secs(60));
            let ctx = context.expect("expected error context");
            assert_eq!(ctx.http_status, Some(429));
            assert_eq!(ctx.provider_code.as_deref(), Some("rate_limit_exceeded"));
            assert_eq!(ctx.request_id.as_deref(), Some("abc123"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn openrouter_surfaces_error_object_inside_200_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "message": "model is overloaded", "code": "overloaded" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let err = adapter.chat(&chat_request()).await.unwrap_err();
    match err {
        ProviderError::Provider {
            provider, context, ..
        } => {
            assert_eq!(provider, "openrouter");
            let ctx = context.expect("expected error context");
            assert_eq!(ctx.provider_code.as_deref(), Some("overloaded"));
        }
        other => panic!("expected Provider, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_request_fails_locally_without_a_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let req = ChatRequest::new(
        ChatModel::openrouter("openai/gpt-5.1-chat"),
        vec![Message::user("x".repeat(MAX_INPUT_CHARS + 1))],
        Attribution::new("test"),
    );

    let err = adapter.chat(&req).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest { .. }));

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn provider_gateway_passes_calls_through_the_trait_object() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "ok" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let gateway: Arc<dyn ChatGateway> =
        Arc::new(ProviderGateway::new(adapter, Arc::new(NoopUsageSink)));

    let resp = gateway.chat(chat_request()).await.unwrap();
    assert_eq!(resp.content, "ok");
}
