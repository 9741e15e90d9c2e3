//! Cortex Analyst client tests against a stub HTTP server.

use std::time::Duration;

use cortex_chat::analyst::{
    AnalystClient, ContentItem, CortexAnalystClient, Message, SemanticModel, ANALYST_API_PATH,
};
use cortex_chat::credentials::SecretString;
use cortex_chat::error::ChatError;
use cortex_chat::session::BearerCredential;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use url::Url;

use super::stub::{closed_port_url, StubResponse, StubServer};

const MODEL_PATH: &str = "CORTEX_ANALYST_DEMO.REVENUE_TIMESERIES.RAW_DATA/revenue_timeseries.yaml";

fn bearer(base: &str) -> BearerCredential {
    BearerCredential {
        base_url: Url::parse(base).unwrap(),
        token: SecretString::new("session-token"),
    }
}

fn client(timeout: Duration) -> CortexAnalystClient {
    CortexAnalystClient::new(timeout).unwrap()
}

fn conversation() -> Vec<Message> {
    vec![Message::user("What was the revenue by month?")]
}

#[tokio::test]
async fn test_successful_reply_and_request_shape() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({
                "message": {
                    "role": "analyst",
                    "content": [
                        {"type": "text", "text": "This is our interpretation of your question:"},
                        {"type": "sql", "statement": "SELECT 1"}
                    ]
                },
                "request_id": "body-id"
            }),
        )
        .with_header("X-Snowflake-Request-Id", "header-id")
    })
    .await;

    let model = SemanticModel::new(MODEL_PATH);
    let reply = client(Duration::from_secs(5))
        .ask(&conversation(), &model, &bearer(&server.url()))
        .await;
    let reply = assert_ok!(reply);

    assert_eq!(reply.request_id.as_deref(), Some("header-id"));
    assert_eq!(
        reply.content,
        vec![
            ContentItem::text("This is our interpretation of your question:"),
            ContentItem::sql("SELECT 1"),
        ]
    );

    let requests = server.requests_to(ANALYST_API_PATH);
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.header("authorization"),
        Some("Snowflake Token=\"session-token\"")
    );
    assert_eq!(
        request.json(),
        json!({
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": "What was the revenue by month?"}]
            }],
            "semantic_model_file": format!("@{MODEL_PATH}")
        })
    );
}

#[tokio::test]
async fn test_request_id_from_body_without_header() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({"message": {"content": [{"type": "text", "text": "hi"}]}, "request_id": "body-id"}),
        )
    })
    .await;

    let model = SemanticModel::new(MODEL_PATH);
    let reply = client(Duration::from_secs(5))
        .ask(&conversation(), &model, &bearer(&server.url()))
        .await
        .unwrap();
    assert_eq!(reply.request_id.as_deref(), Some("body-id"));
}

#[tokio::test]
async fn test_error_status_carries_details() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            400,
            json!({"message": "X", "error_code": "Y", "request_id": "abc"}),
        )
    })
    .await;

    let model = SemanticModel::new(MODEL_PATH);
    let err = assert_err!(
        client(Duration::from_secs(5))
            .ask(&conversation(), &model, &bearer(&server.url()))
            .await
    );

    match &err {
        ChatError::Analyst {
            status,
            request_id,
            error_code,
            message,
        } => {
            assert_eq!(*status, 400);
            assert_eq!(request_id, "abc");
            assert_eq!(error_code, "Y");
            assert_eq!(message, "X");
        }
        other => panic!("Expected Analyst error, got {other:?}"),
    }

    let text = err.to_string();
    assert!(text.contains("`400`"));
    assert!(text.contains("`abc`"));
    assert!(text.contains("`Y`"));
    assert!(text.contains("\nX\n"));
}

#[tokio::test]
async fn test_error_status_with_plain_body() {
    let server = StubServer::start(|_| StubResponse::raw(503, "upstream unavailable")).await;

    let model = SemanticModel::new(MODEL_PATH);
    let err = client(Duration::from_secs(5))
        .ask(&conversation(), &model, &bearer(&server.url()))
        .await
        .unwrap_err();

    match err {
        ChatError::Analyst {
            status,
            request_id,
            error_code,
            message,
        } => {
            assert_eq!(status, 503);
            assert_eq!(request_id, "unknown");
            assert_eq!(error_code, "N/A");
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("Expected Analyst error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_success_without_content_is_malformed() {
    let server = StubServer::start(|_| StubResponse::json(200, json!({}))).await;

    let model = SemanticModel::new(MODEL_PATH);
    let err = client(Duration::from_secs(5))
        .ask(&conversation(), &model, &bearer(&server.url()))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::MalformedResponse { .. }));
    assert_eq!(
        err.to_string(),
        "Received an invalid response format from the Analyst API."
    );
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = StubServer::start(|_| {
        StubResponse::json(200, json!({})).delayed(Duration::from_secs(10))
    })
    .await;

    let model = SemanticModel::new(MODEL_PATH);
    let err = client(Duration::from_millis(300))
        .ask(&conversation(), &model, &bearer(&server.url()))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Timeout(_)), "got {err:?}");
    assert_eq!(err.request_id(), "timeout");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let base = closed_port_url().await;

    let model = SemanticModel::new(MODEL_PATH);
    let err = client(Duration::from_secs(5))
        .ask(&conversation(), &model, &bearer(&base))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Transport(_)), "got {err:?}");
    assert!(err.to_string().starts_with("Request error: "));
}
