use mcpx_core::{ApiError, ChatMessage, CompletionClient, CompletionParams, Role};
use mcpx_openai::{ClientConfig, OpenAIClient};
use mockito::Matcher;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> OpenAIClient {
    OpenAIClient::new(ClientConfig {
        base_url: format!("{}/v1", server.url()),
        api_key: SecretString::new("sk-test".into()),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(
            Role::System,
            "You are a helpful AI assistant. The user's name is Alice.",
        ),
        ChatMessage::new(
            Role::User,
            "Can you explain how context is used in language models?",
        ),
    ]
}

fn completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 30, "completion_tokens": 5, "total_tokens": 35 }
    })
    .to_string()
}

#[tokio::test]
async fn test_submit_sends_messages_and_returns_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4",
            "temperature": 0.7,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful AI assistant. The user's name is Alice."
                },
                {
                    "role": "user",
                    "content": "Can you explain how context is used in language models?"
                }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("Context is used by..."))
        .create_async()
        .await;

    let client = client_for(&server);
    let text = client
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap();

    assert_eq!(text, "Context is used by...");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "error": {
                    "message": "Incorrect API key provided: sk-test1234567890abcd.",
                    "type": "invalid_request_error",
                    "code": "invalid_api_key"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    match err {
        ApiError::Authentication(message) => {
            assert!(message.starts_with("Incorrect API key provided"));
            assert!(!message.contains("1234567890abcd"));
        }
        other => panic!("expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_too_many_requests_maps_to_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(
            json!({
                "error": {
                    "message": "Rate limit reached for gpt-4 on requests per min.",
                    "type": "requests",
                    "code": "rate_limit_exceeded"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::RateLimited("Rate limit reached for gpt-4 on requests per min.".to_string())
    );
}

#[tokio::test]
async fn test_server_error_without_json_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Http {
            status: 500,
            message: "Internal Server Error".to_string()
        }
    );
}

#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{\"choices\": [")
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_no_choices_is_empty_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "x", "model": "gpt-4", "choices": [] }).to_string())
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::EmptyResponse);
}

#[tokio::test]
async fn test_custom_params_are_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.0,
            "max_tokens": 64
        })))
        .with_status(200)
        .with_body(completion_body("short"))
        .create_async()
        .await;

    let params = CompletionParams {
        model: "gpt-4o-mini".to_string(),
        temperature: 0.0,
        max_tokens: Some(64),
    };
    let text = client_for(&server)
        .submit(&messages(), &params)
        .await
        .unwrap();

    assert_eq!(text, "short");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Port 9 (discard) is closed on test machines, so the connect fails fast
    let client = OpenAIClient::new(ClientConfig {
        base_url: "http://127.0.0.1:9/v1".to_string(),
        api_key: SecretString::new("sk-test".into()),
        timeout_seconds: 5,
    })
    .unwrap();

    let err = client
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_) | ApiError::Timeout(_)));
}

#[tokio::test]
async fn test_forbidden_maps_to_authentication() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "error": {
                    "message": "Project does not have access to model gpt-4",
                    "type": "invalid_request_error",
                    "code": "model_not_found"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = client_for(&server)
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Authentication("Project does not have access to model gpt-4".to_string())
    );
}

#[tokio::test]
async fn test_silent_server_times_out() {
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = OpenAIClient::new(ClientConfig {
        base_url: format!("http://{}/v1", addr),
        api_key: SecretString::new("sk-test".into()),
        timeout_seconds: 1,
    })
    .unwrap();

    let err = client
        .submit(&messages(), &CompletionParams::default())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Timeout(1));
    server.abort();
}
