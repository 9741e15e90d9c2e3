//! Cortex Analyst REST client.
//!
//! Sends the full conversation plus the selected semantic model to
//! `/api/v2/cortex/analyst/message` and classifies the reply.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::SemanticModel;
use super::types::{ContentItem, Message, Role};
use super::AnalystClient;
use crate::error::{ChatError, Result};
use crate::session::BearerCredential;

/// Analyst API path relative to the account endpoint.
pub const ANALYST_API_PATH: &str = "/api/v2/cortex/analyst/message";

/// Response header carrying the request id.
const REQUEST_ID_HEADER: &str = "X-Snowflake-Request-Id";

/// Cortex Analyst client.
#[derive(Debug, Clone)]
pub struct CortexAnalystClient {
    client: Client,
    timeout: Duration,
}

impl CortexAnalystClient {
    /// Creates a new client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl AnalystClient for CortexAnalystClient {
    async fn ask(
        &self,
        conversation: &[Message],
        model: &SemanticModel,
        bearer: &BearerCredential,
    ) -> Result<Message> {
        let url = bearer
            .base_url
            .join(ANALYST_API_PATH)
            .map_err(|e| ChatError::internal(format!("Invalid analyst endpoint: {e}")))?;

        let body = AnalystRequest::new(conversation, model);
        debug!(
            messages = conversation.len(),
            model = %model.path(),
            "Sending analyst request"
        );

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer.authorization_header())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::from_request_error(e, self.timeout))?;

        let status = response.status().as_u16();
        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::from_request_error(e, self.timeout))?;

        interpret_response(status, header_request_id, &body)
    }
}

/// Classifies an analyst API reply.
///
/// The request id comes from the response header, then the body's
/// `request_id`, falling back to `"unknown"`. Statuses of 400 and above
/// become [`ChatError::Analyst`]; a success without `message.content` is a
/// [`ChatError::MalformedResponse`].
pub fn interpret_response(
    status: u16,
    header_request_id: Option<String>,
    body: &str,
) -> Result<Message> {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let request_id = header_request_id
        .filter(|id| !id.is_empty())
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|v| v.get("request_id"))
                .and_then(serde_json::Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| "unknown".to_string());

    if status >= 400 {
        let object = parsed.as_ref().filter(|v| v.is_object());
        let error_code = object
            .and_then(|v| v.get("error_code"))
            .map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "N/A".to_string());
        let message = match object {
            Some(v) => v
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("No message provided")
                .to_string(),
            None if body.trim().is_empty() => "No message provided".to_string(),
            None => body.trim().to_string(),
        };

        warn!(status, request_id = %request_id, error_code = %error_code, "Analyst API error");
        return Err(ChatError::Analyst {
            status,
            request_id,
            error_code,
            message,
        });
    }

    let content = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_array);

    match content {
        Some(items) => {
            let content = items.iter().cloned().map(ContentItem::from_json).collect();
            Ok(Message::analyst(content, request_id))
        }
        None => {
            warn!(status, request_id = %request_id, "Analyst response has no message content");
            Err(ChatError::MalformedResponse { request_id })
        }
    }
}

// Analyst API request types

#[derive(Debug, Serialize)]
struct AnalystRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    semantic_model_file: String,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Vec<WireItem<'a>>,
}

/// A content item as the service accepts it. Local error items go out as
/// plain text items.
#[derive(Debug)]
struct WireItem<'a>(&'a ContentItem);

#[derive(Serialize)]
struct WireText<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl Serialize for WireItem<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0 {
            ContentItem::Error { text } => WireText { kind: "text", text }.serialize(serializer),
            item => item.serialize(serializer),
        }
    }
}

impl<'a> AnalystRequest<'a> {
    fn new(conversation: &'a [Message], model: &SemanticModel) -> Self {
        Self {
            messages: conversation
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content.iter().map(WireItem).collect(),
                })
                .collect(),
            semantic_model_file: model.file_reference(),
        }
    }
}
