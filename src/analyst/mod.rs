//! Cortex Analyst integration.
//!
//! Message types, the semantic model catalog, and clients that turn a
//! conversation into the analyst's next reply.

mod cortex;
mod mock;
mod models;
mod types;

pub use cortex::{interpret_response, CortexAnalystClient, ANALYST_API_PATH};
pub use mock::MockAnalystClient;
pub use models::{SemanticModel, SemanticModelCatalog};
pub use types::{ContentItem, Message, Role};

use async_trait::async_trait;

use crate::error::Result;
use crate::session::BearerCredential;

/// Trait for clients that answer a conversation with the next analyst message.
#[async_trait]
pub trait AnalystClient: Send + Sync {
    /// Sends the whole conversation (ending with the user's latest prompt).
    ///
    /// Returns the analyst message with its request id, or a classified error.
    async fn ask(
        &self,
        conversation: &[Message],
        model: &SemanticModel,
        bearer: &BearerCredential,
    ) -> Result<Message>;
}
