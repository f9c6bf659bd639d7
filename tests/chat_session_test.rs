use futures::StreamExt;
use router_chat::chat::ChatSession;
use router_chat::llm::{
    ChatError, ChatRequest, ChatSendResult, ChatTransport, OpenRouterTransport, WireMessage,
};
use router_chat::message::Role;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = ": OPENROUTER PROCESSING\n\n\
data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n\
data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n\
data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

fn transport(server: &MockServer) -> OpenRouterTransport {
    OpenRouterTransport::new(format!("{}/api/v1", server.uri()), "sk-or-test")
}

fn request(text: &str) -> ChatRequest {
    ChatRequest {
        model: "openai/gpt-4o".to_string(),
        max_tokens: Some(1000),
        messages: vec![WireMessage {
            role: "user".to_string(),
            content: text.to_string(),
        }],
        stream: true,
    }
}

async fn mount_stream(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "openai/gpt-4o",
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SSE_BODY.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_transport_streams_event_stream_responses() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let chunks = match transport(&server).send(request("hi")).await.unwrap() {
        ChatSendResult::Streaming(chunks) => chunks,
        other => panic!("expected a streaming result, got {other:?}"),
    };

    let deltas: Vec<String> = chunks
        .map(|chunk| chunk.unwrap().delta().to_string())
        .collect()
        .await;
    assert_eq!(deltas, vec!["Hel", "lo", " world"]);
}

#[tokio::test]
async fn test_transport_returns_complete_json_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "gen-2",
            "model": "openai/gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}]
        })))
        .mount(&server)
        .await;

    let result = transport(&server).send(request("hi")).await.unwrap();
    match result {
        ChatSendResult::Complete(response) => assert_eq!(response.assistant_text(), "Hi"),
        other => panic!("expected a complete result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_maps_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": {"code": 402, "message": "Insufficient credits"}
        })))
        .mount(&server)
        .await;

    let err = transport(&server).send(request("hi")).await.unwrap_err();
    match err {
        ChatError::Api { status, message } => {
            assert_eq!(status, 402);
            assert_eq!(message, "Insufficient credits");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_session_assembles_streamed_reply() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let mut session = ChatSession::new("openai/gpt-4o", Some(1000)).with_greeting("Hello!");
    let mut seen = Vec::new();
    let sent = session
        .send(&transport(&server), "hi", |message, loading| {
            seen.push((message.content.clone(), loading))
        })
        .await
        .unwrap();

    assert!(sent);
    let contents: Vec<&str> = seen.iter().map(|(content, _)| content.as_str()).collect();
    assert_eq!(contents, vec!["", "Hel", "Hello", "Hello world"]);
    assert!(seen.iter().all(|(_, loading)| *loading));

    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(session.messages()[2].content, "Hello world");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_session_send_failure_keeps_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"code": 401, "message": "No auth credentials found"}
        })))
        .mount(&server)
        .await;

    let mut session = ChatSession::new("openai/gpt-4o", None);
    let err = session
        .send(&transport(&server), "hi", |_, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Api { status: 401, .. }));
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].content, "hi");
    assert!(!session.is_loading());
}
