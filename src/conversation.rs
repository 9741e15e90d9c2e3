//! Conversation state machine.
//!
//! Holds the ordered message list and the small amount of per-cycle state
//! (pending suggestion, error notification, reset marker). Network calls
//! are made by the orchestrator; this type only records their outcome.

use crate::analyst::Message;
use crate::error::ChatError;
use tracing::debug;

/// Question submitted automatically when a connected conversation is empty.
pub const BOOTSTRAP_QUESTION: &str = "What questions can I ask?";

/// Request id of the static welcome message.
pub const WELCOME_REQUEST_ID: &str = "welcome";

pub const WELCOME_TEXT: &str = "👋 Welcome to Cortex Analyst! Connect to Snowflake with \
    /connect (see /config and /set for credentials), then ask a question about your data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Empty,
    AwaitingResponse,
    Idle,
}

/// What the orchestrator should do after a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    Nothing,
    /// Submit the bootstrap question.
    Bootstrap,
    /// The welcome message was appended.
    Welcomed,
}

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    awaiting: bool,
    active_suggestion: Option<String>,
    error_notification: bool,
    just_reset: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConversationState {
        if self.awaiting {
            ConversationState::AwaitingResponse
        } else if self.messages.is_empty() {
            ConversationState::Empty
        } else {
            ConversationState::Idle
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends the user's prompt and enters `AwaitingResponse`.
    pub fn begin_turn(&mut self, prompt: &str) {
        self.messages.push(Message::user(prompt));
        self.awaiting = true;
    }

    /// Records the analyst outcome of the current turn.
    ///
    /// Failures become an analyst message with error content and raise the
    /// one-shot error notification.
    pub fn complete_turn(&mut self, outcome: Result<Message, ChatError>) {
        self.awaiting = false;
        match outcome {
            Ok(message) => self.messages.push(message),
            Err(e) => {
                debug!(category = e.category(), "Analyst turn failed");
                let request_id = e.request_id().to_string();
                self.messages
                    .push(Message::analyst_error(e.to_string(), request_id));
                self.error_notification = true;
            }
        }
    }

    /// Returns and clears the error notification flag.
    pub fn take_error_notification(&mut self) -> bool {
        std::mem::take(&mut self.error_notification)
    }

    pub fn has_error_notification(&self) -> bool {
        self.error_notification
    }

    /// Marks a suggestion as chosen; it is submitted on the next cycle.
    pub fn select_suggestion(&mut self, suggestion: impl Into<String>) {
        self.active_suggestion = Some(suggestion.into());
    }

    pub fn active_suggestion(&self) -> Option<&str> {
        self.active_suggestion.as_deref()
    }

    pub fn take_suggestion(&mut self) -> Option<String> {
        self.active_suggestion.take()
    }

    /// Drops a pending suggestion, e.g. when a typed question takes priority.
    pub fn clear_suggestion(&mut self) {
        self.active_suggestion = None;
    }

    /// Suggestions of the most recent message that offered any.
    pub fn latest_suggestions(&self) -> Option<&[String]> {
        self.messages.iter().rev().find_map(Message::suggestions)
    }

    /// Clears all messages and the pending suggestion.
    ///
    /// The next cycle will not auto-submit the bootstrap question.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.active_suggestion = None;
        self.awaiting = false;
        self.just_reset = true;
    }

    pub fn just_reset(&self) -> bool {
        self.just_reset
    }

    /// Drops the conversation if it holds nothing but the welcome message.
    ///
    /// Returns true when it was dropped.
    pub fn discard_welcome(&mut self) -> bool {
        let only_welcome = self.messages.len() == 1
            && self.messages[0].request_id.as_deref() == Some(WELCOME_REQUEST_ID);
        if only_welcome {
            self.messages.clear();
        }
        only_welcome
    }

    /// Runs the empty-conversation logic for one cycle.
    pub fn cycle(&mut self, connected: bool) -> CycleAction {
        if !self.messages.is_empty() || self.awaiting {
            return CycleAction::Nothing;
        }

        if connected {
            if std::mem::take(&mut self.just_reset) {
                CycleAction::Nothing
            } else {
                CycleAction::Bootstrap
            }
        } else {
            self.just_reset = false;
            self.messages.push(Message::analyst(
                vec![crate::analyst::ContentItem::text(WELCOME_TEXT)],
                WELCOME_REQUEST_ID,
            ));
            CycleAction::Welcomed
        }
    }
}
