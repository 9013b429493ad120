//! Integration tests for the chat backend client using wiremock.

use another_chat_client::api::types::{Provider, TelegramUser};
use another_chat_client::api::{ApiError, ChatApiClient};
use another_chat_client::session::SessionContext;
use another_chat_client::stream::{ChatId, FailureKind};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ChatApiClient {
    ChatApiClient::new(format!("{}/api", server.uri()), Duration::from_secs(5))
}

fn session() -> SessionContext {
    SessionContext::new(Provider::Claude).with_user(TelegramUser {
        id: 501,
        first_name: Some("Иван".to_string()),
        username: Some("ivan".to_string()),
    })
}

fn event_stream(body: impl Into<Vec<u8>>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_bytes(body.into())
}

#[tokio::test]
async fn chat_stream_delivers_full_text_and_records_chat_id() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"chat_id\": 77}\n\n",
        "data: {\"content\": \"Привет\"}\n\n",
        "data: {\"content\": \", мир\"}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(body_partial_json(json!({
            "message": "Как дела?",
            "provider": "claude",
            "maxTokens": 2000,
            "user": {"id": 501}
        })))
        .respond_with(event_stream(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = session();
    let mut calls = Vec::new();
    let outcome = client
        .chat_stream(&mut session, "Как дела?", |text: &str| {
            calls.push(text.to_string());
        })
        .await
        .expect("stream should complete");

    assert_eq!(outcome.text, "Привет, мир");
    assert_eq!(outcome.chat_id, Some(ChatId::Number(77)));
    assert_eq!(calls, vec!["Привет".to_string(), "Привет, мир".to_string()]);
    assert_eq!(session.chat_id, Some(ChatId::Number(77)));
}

#[tokio::test]
async fn chat_stream_server_error_is_distinguished() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"content\":\"partial \"}\n\n",
        "data: {\"error\":\"quota exceeded\"}\n\n",
        "data: {\"content\":\"ignored\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = session();
    let mut calls = Vec::new();
    let result = client
        .chat_stream(&mut session, "hi", |text: &str| calls.push(text.to_string()))
        .await;

    match result {
        Err(ApiError::Stream(e)) => {
            assert_eq!(e.kind(), FailureKind::ServerError);
            assert_eq!(e.message(), "quota exceeded");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert_eq!(calls, vec!["partial ".to_string()]);
}

#[tokio::test]
async fn chat_stream_html_error_page_is_cleaned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_string("<html><body><h1>502 Bad Gateway</h1></body></html>"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = session();
    let result = client.chat_stream(&mut session, "hi", |_: &str| {}).await;

    match result {
        Err(ApiError::Http { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "Server returned HTML error page");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert!(session.chat_id.is_none());
}

#[tokio::test]
async fn chat_records_chat_id_from_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"response": "Готово", "provider": "claude", "chat_id": 5}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = session();
    let reply = client
        .chat(&mut session, "Сделай")
        .await
        .expect("chat should succeed");

    assert_eq!(reply.response, "Готово");
    assert_eq!(session.chat_id, Some(ChatId::Number(5)));
}

#[tokio::test]
async fn backend_validation_error_surfaces_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Unknown provider: llama"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut session = session();
    let result = client.chat(&mut session, "hi").await;

    assert!(matches!(
        result,
        Err(ApiError::Http { status: 400, ref message }) if message == "Unknown provider: llama"
    ));
}

#[tokio::test]
async fn health_and_providers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "timestamp": 1_700_000_000.5,
            "version": "1.0.0"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "providers": ["openai", "groq"],
                "all": ["openai", "gemini", "claude", "groq", "mistral"],
                "status": {}
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let health = client.health().await.expect("health should succeed");
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, "1.0.0");

    let providers = client.providers().await.expect("providers should succeed");
    assert_eq!(providers.available(), vec![Provider::OpenAi, Provider::Groq]);
    assert_eq!(providers.all.len(), 5);
}

#[tokio::test]
async fn history_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .and(query_param("user_id", "501"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"chats": [{
                "id": 9,
                "user_id": "501",
                "title": "Рецепты",
                "provider": "gemini",
                "group_id": null,
                "created_at": "2025-03-01T10:00:00+00:00",
                "updated_at": "2025-03-01T10:05:00",
                "message_count": 2
            }]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/9/messages"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"chat_id": 9, "messages": [
                {"id": 1, "chat_id": 9, "role": "user", "content": "Борщ?", "provider": "gemini",
                 "temperature": "0.7", "max_tokens": 2000, "created_at": null},
                {"id": 2, "chat_id": 9, "role": "assistant", "content": "Свёкла…", "provider": "gemini",
                 "temperature": "0.7", "max_tokens": 2000, "created_at": "2025-03-01T10:05:00"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .and(query_param("chat_id", "404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": "Chat not found"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let chats = client.user_chats(501).await.expect("chats should load");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].title.as_deref(), Some("Рецепты"));
    assert!(chats[0].updated_at.is_some());

    let messages = client
        .chat_messages(&ChatId::Number(9), 50)
        .await
        .expect("messages should load");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, "assistant");
    assert!(messages[0].created_at.is_none());

    let missing = client.chat_with_messages(&ChatId::Number(404)).await;
    assert!(matches!(missing, Err(ApiError::Http { status: 404, .. })));
}
