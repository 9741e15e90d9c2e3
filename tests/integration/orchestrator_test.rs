//! End-to-end chat flow over HTTP: Snowflake login, analyst turns, SQL
//! execution, summaries and caching, all served by one stub server.

use std::sync::Arc;

use cortex_chat::analyst::{CortexAnalystClient, Role, ANALYST_API_PATH};
use cortex_chat::app::{InputResult, Orchestrator};
use cortex_chat::config::Config;
use cortex_chat::conversation::{CycleAction, BOOTSTRAP_QUESTION};
use cortex_chat::credentials::{CredentialField, CredentialLayer, CredentialResolver, LayerKind};
use cortex_chat::render::plain_text;
use cortex_chat::session::SessionState;
use cortex_chat::warehouse::SnowflakeRestClient;
use pretty_assertions::assert_eq;
use ratatui::text::Line;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use super::stub::{RecordedRequest, StubResponse, StubServer};

const QUERY_PATH: &str = "/queries/v1/query-request";
const SALES_SQL: &str = "SELECT region, total FROM sales ORDER BY total DESC";

fn route(request: &RecordedRequest) -> StubResponse {
    match request.path() {
        "/session/v1/login-request" => {
            StubResponse::json(200, json!({"success": true, "data": {"token": "sess-token"}}))
        }
        "/session/logout-request" => StubResponse::json(200, json!({"success": true})),
        QUERY_PATH => query_reply(request),
        ANALYST_API_PATH => analyst_reply(request),
        _ => StubResponse::raw(404, "not found"),
    }
}

fn analyst_reply(request: &RecordedRequest) -> StubResponse {
    let body = request.json();
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let question = messages
        .last()
        .and_then(|m| m["content"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();

    if question.contains("broken") {
        return StubResponse::json(200, json!({}));
    }
    if question.contains("forbidden") {
        return StubResponse::json(
            403,
            json!({"message": "Access denied", "error_code": "390001", "request_id": "req-403"}),
        );
    }

    let content = if question == BOOTSTRAP_QUESTION {
        json!([
            {"type": "text", "text": "You can ask about sales by region."},
            {"type": "suggestions", "suggestions": ["Which region sold the most?", "What were total sales?"]}
        ])
    } else {
        json!([
            {"type": "text", "text": "This is our interpretation of your question:"},
            {"type": "sql", "statement": SALES_SQL}
        ])
    };

    StubResponse::json(200, json!({"message": {"role": "analyst", "content": content}}))
        .with_header("X-Snowflake-Request-Id", &format!("req-{}", messages.len()))
}

fn query_reply(request: &RecordedRequest) -> StubResponse {
    let sql = request.json()["sqlText"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let data = if sql.contains("SNOWFLAKE.CORTEX.COMPLETE") {
        json!({
            "rowtype": [{"name": "INSIGHTS", "type": "text"}],
            "rowset": [["East leads with 10.50 in sales."]],
            "queryResultFormat": "json"
        })
    } else {
        json!({
            "rowtype": [
                {"name": "REGION", "type": "text"},
                {"name": "TOTAL", "type": "fixed", "scale": 2}
            ],
            "rowset": [["East", "10.50"], ["West", "7.25"]],
            "queryResultFormat": "json"
        })
    };
    StubResponse::json(200, json!({"success": true, "data": data}))
}

fn orchestrator(server: &StubServer, with_token: bool) -> Orchestrator {
    let mut config = Config::default();
    config.warehouse.base_url = Some(server.url());
    config.analyst.timeout_secs = 5;

    let mut interactive = CredentialLayer::interactive()
        .with(CredentialField::Account, "xy12345")
        .with(CredentialField::User, "analyst");
    if with_token {
        interactive.set(CredentialField::Token, "pat-secret");
    }
    let resolver = CredentialResolver::new(vec![
        interactive,
        CredentialLayer::new(LayerKind::Environment),
    ]);

    let warehouse = Arc::new(SnowflakeRestClient::new(&config.warehouse).unwrap());
    let analyst = Box::new(CortexAnalystClient::new(config.analyst.timeout()).unwrap());
    Orchestrator::new(&config, resolver, warehouse, analyst).unwrap()
}

fn text(lines: &[Line<'_>]) -> String {
    lines.iter().map(plain_text).collect::<Vec<_>>().join("\n")
}

#[tokio::test]
async fn test_full_conversation_flow() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);

    let connection = assert_ok!(orch.connect().await);
    assert!(connection.starts_with("analyst @ xy12345"));
    assert_eq!(orch.gateway().state(), &SessionState::Connected);

    // Empty connected conversation asks the bootstrap question.
    assert_eq!(orch.cycle().await, CycleAction::Bootstrap);
    let rendered = text(&orch.render_new_messages().await);
    assert!(rendered.contains("You can ask about sales by region."));
    assert!(rendered.contains("[1] Which region sold the most?"));
    assert!(rendered.contains("(request req-1)"));

    // Choosing a suggestion submits it on the next cycle.
    assert!(matches!(orch.handle_input("/suggest 1").await, InputResult::None));
    orch.cycle().await;
    let rendered = text(&orch.render_new_messages().await);

    assert!(rendered.contains("Which region sold the most?"));
    assert!(rendered.contains(SALES_SQL));
    assert!(rendered.contains("Insights"));
    assert!(rendered.contains("East leads with 10.50 in sales."));
    assert!(rendered.contains("East"));
    assert!(rendered.contains("7.25"));
    assert!(rendered.contains("2 rows returned"));
    assert!(!orch.take_error_notification());

    // The analyst received the whole conversation.
    let analyst_requests = server.requests_to(ANALYST_API_PATH);
    assert_eq!(analyst_requests.len(), 2);
    let roles: Vec<String> = analyst_requests[1].json()["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(roles, vec!["user", "analyst", "user"]);
    assert_eq!(
        analyst_requests[1].header("authorization"),
        Some("Snowflake Token=\"sess-token\"")
    );

    // Result plus summary.
    assert_eq!(server.requests_to(QUERY_PATH).len(), 2);
    let table = orch.last_table().unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns[0].name, "REGION");
}

#[tokio::test]
async fn test_history_reuses_cached_results() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);
    orch.connect().await.unwrap();

    orch.handle_input("Which region sold the most?").await;
    orch.render_new_messages().await;
    let queries = server.requests_to(QUERY_PATH).len();
    assert_eq!(queries, 2);

    orch.handle_input("/history").await;
    let rendered = text(&orch.render_new_messages().await);
    assert!(rendered.contains("2 rows returned"));
    assert_eq!(server.requests_to(QUERY_PATH).len(), queries);
    assert_eq!(orch.gateway().cached_results(), 2);
}

#[tokio::test]
async fn test_malformed_reply_records_single_error() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);
    orch.connect().await.unwrap();

    orch.handle_input("a broken question").await;

    let messages = orch.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Analyst);
    assert!(messages[1].is_error());
    assert!(orch.take_error_notification());
    assert!(!orch.take_error_notification());

    let rendered = text(&orch.render_new_messages().await);
    assert!(rendered.contains("Received an invalid response format from the Analyst API."));
}

#[tokio::test]
async fn test_error_status_is_rendered_with_details() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);
    orch.connect().await.unwrap();

    orch.handle_input("a forbidden question").await;
    assert!(orch.take_error_notification());

    let last = orch.conversation().last().unwrap();
    assert_eq!(last.request_id.as_deref(), Some("req-403"));
    let rendered = text(&orch.render_new_messages().await);
    assert!(rendered.contains("`403`"));
    assert!(rendered.contains("`390001`"));
    assert!(rendered.contains("Access denied"));
}

#[tokio::test]
async fn test_missing_token_never_reaches_network() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, false);

    let err = assert_err!(orch.connect().await);
    assert_eq!(err.to_string(), "Please provide a valid Personal Access Token.");
    assert!(server.requests().is_empty());

    // Questions without a session fail locally.
    orch.handle_input("Which region sold the most?").await;
    assert!(orch.conversation().last().unwrap().is_error());
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_disconnect_logs_out() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);
    orch.connect().await.unwrap();

    let result = orch.handle_input("/disconnect").await;
    assert!(matches!(result, InputResult::Output(_)));
    assert!(!orch.gateway().is_connected());
    assert_eq!(orch.gateway().state(), &SessionState::Absent);
    assert_eq!(server.requests_to("/session/logout-request").len(), 1);
}

#[tokio::test]
async fn test_reset_keeps_session_and_skips_bootstrap() {
    let server = StubServer::start(route).await;
    let mut orch = orchestrator(&server, true);
    orch.connect().await.unwrap();
    orch.cycle().await;
    assert_eq!(orch.conversation().len(), 2);

    orch.handle_input("/reset").await;
    assert!(orch.conversation().is_empty());
    assert!(orch.gateway().is_connected());

    assert_eq!(orch.cycle().await, CycleAction::Nothing);
    assert_eq!(server.requests_to(ANALYST_API_PATH).len(), 1);
    assert_eq!(orch.cycle().await, CycleAction::Bootstrap);
    assert_eq!(server.requests_to(ANALYST_API_PATH).len(), 2);
}
