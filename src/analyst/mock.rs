//! Mock analyst client for testing and offline demos.
//!
//! Scripted replies are returned first, in order; after that, replies are
//! derived from the last user prompt.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::models::SemanticModel;
use super::types::{ContentItem, Message, Role};
use super::AnalystClient;
use crate::error::{ChatError, Result};
use crate::session::BearerCredential;

/// Mock analyst client.
#[derive(Debug, Default)]
pub struct MockAnalystClient {
    scripted: Mutex<VecDeque<Result<Message>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockAnalystClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    pub fn with_reply(self, content: Vec<ContentItem>) -> Self {
        let id = format!("mock-{}", self.queued() + 1);
        self.push(Ok(Message::analyst(content, id)));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, error: ChatError) -> Self {
        self.push(Err(error));
        self
    }

    /// Conversations received so far, one entry per request.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn queued(&self) -> usize {
        self.scripted.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn push(&self, reply: Result<Message>) {
        if let Ok(mut queue) = self.scripted.lock() {
            queue.push_back(reply);
        }
    }

    fn canned_reply(prompt: &str) -> Vec<ContentItem> {
        let prompt = prompt.to_lowercase();

        if prompt.contains("what questions can i ask") {
            return vec![
                ContentItem::text(
                    "This semantic model covers monthly revenue. Here are some questions you can ask:",
                ),
                ContentItem::suggestions([
                    "What was the revenue by month?",
                    "Which month had the highest revenue?",
                    "How did revenue change over the first half of 2024?",
                ]),
            ];
        }

        if prompt.contains("revenue") {
            return vec![
                ContentItem::text(
                    "This is our interpretation of your question: monthly revenue for 2024.",
                ),
                ContentItem::sql(
                    "SELECT month, revenue FROM cortex_analyst_demo.revenue_timeseries.monthly_revenue ORDER BY month",
                ),
            ];
        }

        vec![
            ContentItem::text("I could not match that question to the semantic model."),
            ContentItem::suggestions(["What was the revenue by month?"]),
        ]
    }
}

#[async_trait]
impl AnalystClient for MockAnalystClient {
    async fn ask(
        &self,
        conversation: &[Message],
        _model: &SemanticModel,
        _bearer: &BearerCredential,
    ) -> Result<Message> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(conversation.to_vec());
        }

        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }

        let prompt = conversation
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| {
                m.content.iter().find_map(|item| match item {
                    ContentItem::Text { text } => Some(text.as_str()),
                    _ => None,
                })
            })
            .unwrap_or_default();

        let id = format!("mock-{}", self.request_count());
        Ok(Message::analyst(Self::canned_reply(prompt), id))
    }
}
