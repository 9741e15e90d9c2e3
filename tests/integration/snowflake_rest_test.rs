//! Snowflake REST client tests against a stub HTTP server.

use std::time::Duration;

use cortex_chat::config::WarehouseSettings;
use cortex_chat::credentials::{ConnectionConfig, CredentialField};
use cortex_chat::error::ChatError;
use cortex_chat::warehouse::{RawColumn, SnowflakeRestClient, Warehouse, WarehouseSession};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::assert_ok;
use url::Url;

use super::stub::{RecordedRequest, StubResponse, StubServer};

fn client_for(server: &StubServer) -> SnowflakeRestClient {
    let settings = WarehouseSettings {
        base_url: Some(server.url()),
        query_timeout_secs: 10,
        ..WarehouseSettings::default()
    };
    SnowflakeRestClient::new(&settings).unwrap()
}

fn connection() -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    config.set(CredentialField::Account, "xy12345.us-east-1");
    config.set(CredentialField::User, "analyst");
    config.set(CredentialField::Token, "pat-secret");
    config.set(CredentialField::Warehouse, "COMPUTE_WH");
    config.set(CredentialField::Database, "SALES");
    config
}

fn session(server: &StubServer) -> WarehouseSession {
    WarehouseSession::new("sess-token", Url::parse(&server.url()).unwrap())
}

fn query_result(rows: serde_json::Value) -> StubResponse {
    StubResponse::json(
        200,
        json!({
            "success": true,
            "code": null,
            "data": {
                "rowtype": [
                    {"name": "REGION", "type": "text", "scale": null},
                    {"name": "TOTAL", "type": "fixed", "scale": 2}
                ],
                "rowset": rows,
                "queryResultFormat": "json",
                "queryId": "01b2-0000"
            }
        }),
    )
}

#[tokio::test]
async fn test_login_sends_credentials_and_returns_session() {
    let server = StubServer::start(|_| {
        StubResponse::json(200, json!({"success": true, "data": {"token": "sess-token"}}))
    })
    .await;

    let session = assert_ok!(client_for(&server).login(&connection()).await);
    assert_eq!(session.token.expose(), "sess-token");
    assert_eq!(session.base_url.as_str(), format!("{}/", server.url()));

    let requests = server.requests_to("/session/v1/login-request");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.target.contains("warehouse=COMPUTE_WH"));
    assert!(request.target.contains("databaseName=SALES"));
    assert!(!request.target.contains("schemaName"));

    let body = request.json();
    assert_eq!(body["data"]["ACCOUNT_NAME"], "XY12345");
    assert_eq!(body["data"]["LOGIN_NAME"], "analyst");
    assert_eq!(body["data"]["PASSWORD"], "pat-secret");
    assert!(body["data"].get("AUTHENTICATOR").is_none());
}

#[tokio::test]
async fn test_login_rejected() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({"success": false, "code": "390100", "message": "Incorrect username or password was specified."}),
        )
    })
    .await;

    let err = client_for(&server).login(&connection()).await.unwrap_err();
    match err {
        ChatError::Auth(msg) => {
            assert!(msg.contains("Incorrect username or password"));
            assert!(msg.contains("390100"));
        }
        other => panic!("Expected Auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_unauthorized_status() {
    let server = StubServer::start(|_| StubResponse::raw(401, "")).await;
    let err = client_for(&server).login(&connection()).await.unwrap_err();
    assert!(matches!(err, ChatError::Auth(_)));
}

#[tokio::test]
async fn test_login_without_token_fails_before_request() {
    let server = StubServer::start(|_| StubResponse::json(200, json!({"success": true}))).await;

    let mut config = connection();
    config.token = None;
    let err = client_for(&server).login(&config).await.unwrap_err();

    assert!(matches!(
        err,
        ChatError::MissingCredential(CredentialField::Token)
    ));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_execute_returns_columns_and_rows() {
    let server = StubServer::start(|_| {
        query_result(json!([["East", "10.50"], ["West", null]]))
    })
    .await;

    let result = client_for(&server)
        .execute(&session(&server), "SELECT region, total FROM sales")
        .await
        .unwrap();

    assert_eq!(
        result.columns,
        vec![
            RawColumn::new("REGION", "text"),
            RawColumn::new("TOTAL", "fixed").with_scale(2),
        ]
    );
    assert_eq!(
        result.rows,
        vec![
            vec![Some("East".to_string()), Some("10.50".to_string())],
            vec![Some("West".to_string()), None],
        ]
    );

    let requests = server.requests_to("/queries/v1/query-request");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].header("authorization"),
        Some("Snowflake Token=\"sess-token\"")
    );
    assert_eq!(
        requests[0].json()["sqlText"],
        "SELECT region, total FROM sales"
    );
    assert!(requests[0].target.contains("requestId="));
}

#[tokio::test]
async fn test_execute_polls_until_complete() {
    let server = StubServer::start(|request: &RecordedRequest| {
        if request.path() == "/queries/v1/query-request" {
            StubResponse::json(
                200,
                json!({
                    "success": true,
                    "code": "333334",
                    "data": {"getResultUrl": "/queries/01b2-0000/result"}
                }),
            )
        } else {
            query_result(json!([["North", "3.00"]]))
        }
    })
    .await;

    let result = client_for(&server)
        .execute(&session(&server), "SELECT 1")
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let polls = server.requests_to("/queries/01b2-0000/result");
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].method, "GET");
}

#[tokio::test]
async fn test_execute_downloads_chunks() {
    let server = StubServer::start(|request: &RecordedRequest| match request.path() {
        "/chunks/0" => StubResponse::raw(200, r#"["South", "1.00"], ["Central", "2.00"]"#),
        _ => StubResponse::json(
            200,
            json!({
                "success": true,
                "data": {
                    "rowtype": [
                        {"name": "REGION", "type": "text"},
                        {"name": "TOTAL", "type": "fixed", "scale": 2}
                    ],
                    "rowset": [["East", "10.50"]],
                    "chunks": [{"url": format!("{}/chunks/0", request_base(request))}],
                    "qrmk": "master-key"
                }
            }),
        ),
    })
    .await;

    let result = client_for(&server)
        .execute(&session(&server), "SELECT region, total FROM sales")
        .await
        .unwrap();

    let regions: Vec<_> = result
        .rows
        .iter()
        .map(|row| row[0].clone().unwrap())
        .collect();
    assert_eq!(regions, vec!["East", "South", "Central"]);

    let chunk_requests = server.requests_to("/chunks/0");
    assert_eq!(chunk_requests.len(), 1);
    assert_eq!(
        chunk_requests[0].header("x-amz-server-side-encryption-customer-key"),
        Some("master-key")
    );
}

/// Base URL of the server a request was sent to, from its Host header.
fn request_base(request: &RecordedRequest) -> String {
    format!("http://{}", request.header("host").unwrap_or_default())
}

#[tokio::test]
async fn test_expired_session_is_auth_error() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({"success": false, "code": "390112", "message": "Your session has expired."}),
        )
    })
    .await;

    let err = client_for(&server)
        .execute(&session(&server), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Auth(_)));
}

#[tokio::test]
async fn test_sql_error_is_execution_error() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({
                "success": false,
                "code": "002003",
                "message": "SQL compilation error: Object 'SALES' does not exist."
            }),
        )
    })
    .await;

    let err = client_for(&server)
        .execute(&session(&server), "SELECT * FROM sales")
        .await
        .unwrap_err();
    match err {
        ChatError::Execution(detail) => {
            assert!(detail.contains("Object 'SALES' does not exist"));
            assert!(detail.contains("002003"));
        }
        other => panic!("Expected Execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_arrow_results_are_rejected() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({"success": true, "data": {"queryResultFormat": "arrow", "rowsetBase64": ""}}),
        )
    })
    .await;

    let err = client_for(&server)
        .execute(&session(&server), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Execution(_)));
}

#[tokio::test]
async fn test_logout_deletes_session() {
    let server = StubServer::start(|_| StubResponse::json(200, json!({"success": true}))).await;

    client_for(&server)
        .logout(&session(&server))
        .await
        .unwrap();

    let requests = server.requests_to("/session/logout-request");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].target.contains("delete=true"));
}

#[tokio::test]
async fn test_query_timeout_while_polling() {
    let server = StubServer::start(|_| {
        StubResponse::json(
            200,
            json!({
                "success": true,
                "code": "333333",
                "data": {"getResultUrl": "/queries/slow/result"}
            }),
        )
    })
    .await;

    let settings = WarehouseSettings {
        base_url: Some(server.url()),
        query_timeout_secs: 1,
        ..WarehouseSettings::default()
    };
    let client = SnowflakeRestClient::new(&settings).unwrap();

    let started = std::time::Instant::now();
    let err = client.execute(&session(&server), "SELECT 1").await.unwrap_err();
    assert!(matches!(err, ChatError::Timeout(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
