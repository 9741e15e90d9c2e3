//! Core orchestrator for cortex-chat.
//!
//! Coordinates the credential resolver, session gateway, analyst client,
//! conversation state and result renderer to implement the chat loop.

use std::str::FromStr;
use std::sync::Arc;

use ratatui::{
    style::{Color, Modifier, Style},
    text::Line,
};
use tracing::info;

use crate::analyst::{AnalystClient, SemanticModelCatalog};
use crate::config::Config;
use crate::conversation::{Conversation, CycleAction, BOOTSTRAP_QUESTION};
use crate::credentials::{mask_secret, CredentialField, CredentialResolver, ResolvedConnection};
use crate::error::{ChatError, Result};
use crate::render::{ChartError, ChartKind, ChartSpec, ResultRenderer};
use crate::session::{SessionGateway, SessionHandle, SessionState};
use crate::warehouse::{Table, Warehouse};

/// Help text displayed for the /help command.
const HELP_TEXT: &str = r#"Ask a question in plain English, or use a command:

Connection:
  /config                 - Show the effective connection settings and their sources
  /set <field> <value>    - Set account, user, token, warehouse, database, schema or authenticator
  /unset <field>          - Remove a value set with /set
  /connect                - Connect to Snowflake
  /disconnect             - Close the Snowflake session

Conversation:
  /models                 - List semantic models
  /model <n|name>         - Switch semantic model (clears the conversation)
  /suggest <n>            - Ask suggested question n
  /reset                  - Clear the conversation (keeps the session)
  /history                - Show the whole conversation again
  /chart [x] [y] [line|bar] - Plot the last result
  /help                   - Show this help message
  /quit, /exit            - Exit the application"#;

/// Result of processing user input.
#[derive(Debug)]
pub enum InputResult {
    /// No action needed (empty input, etc.)
    None,
    /// Command output to print.
    Output(Vec<Line<'static>>),
    /// Application should exit.
    Exit,
}

impl InputResult {
    fn info(text: impl Into<String>) -> Self {
        Self::Output(text.into().lines().map(|l| Line::raw(l.to_string())).collect())
    }

    fn error(text: impl Into<String>) -> Self {
        let style = Style::default().fg(Color::Red);
        Self::Output(
            text.into()
                .lines()
                .map(|l| Line::styled(l.to_string(), style))
                .collect(),
        )
    }
}

/// The main orchestrator that coordinates all components.
pub struct Orchestrator {
    /// Layered connection settings.
    resolver: CredentialResolver,
    /// Warehouse session and result cache.
    gateway: SessionGateway,
    /// Analyst API client.
    analyst: Box<dyn AnalystClient>,
    conversation: Conversation,
    models: SemanticModelCatalog,
    renderer: ResultRenderer,
    /// Number of messages already shown.
    rendered: usize,
    /// Most recent table, for /chart.
    last_table: Option<Arc<Table>>,
}

impl Orchestrator {
    /// Creates a new orchestrator with the given components.
    pub fn new(
        config: &Config,
        resolver: CredentialResolver,
        warehouse: Arc<dyn Warehouse>,
        analyst: Box<dyn AnalystClient>,
    ) -> Result<Self> {
        let models = SemanticModelCatalog::new(
            config.analyst.semantic_models.iter().cloned(),
            config.analyst.default_model,
        )?;

        Ok(Self {
            resolver,
            gateway: SessionGateway::new(warehouse, config.warehouse.cache_capacity),
            analyst,
            conversation: Conversation::new(),
            models,
            renderer: ResultRenderer::new(config.summary.clone(), config.display.clone()),
            rendered: 0,
            last_table: None,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    pub fn models(&self) -> &SemanticModelCatalog {
        &self.models
    }

    pub fn last_table(&self) -> Option<&Arc<Table>> {
        self.last_table.as_ref()
    }

    pub fn resolved_connection(&self) -> ResolvedConnection {
        self.resolver.resolve()
    }

    /// Processes user input, either a command or a question.
    pub async fn handle_input(&mut self, input: &str) -> InputResult {
        let input = input.trim();

        if input.is_empty() {
            return InputResult::None;
        }

        if input.starts_with('/') {
            return self.handle_command(input).await;
        }

        // A typed question wins over a pending suggestion.
        self.conversation.clear_suggestion();
        self.submit(input).await;
        InputResult::None
    }

    /// Handles a command (input starting with /).
    async fn handle_command(&mut self, input: &str) -> InputResult {
        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let command = parts[0].to_lowercase();
        let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

        match command.as_str() {
            "/help" => InputResult::info(HELP_TEXT),
            "/quit" | "/exit" => InputResult::Exit,
            "/config" => self.handle_config(),
            "/set" => self.handle_set(args),
            "/unset" => self.handle_unset(args),
            "/connect" => match self.connect().await {
                Ok(connection) => InputResult::info(format!("Connected to Snowflake as {connection}.")),
                Err(e) => InputResult::error(format!("Failed to connect: {e}")),
            },
            "/disconnect" => {
                if self.gateway.is_connected() {
                    self.disconnect().await;
                    InputResult::info("Disconnected.")
                } else {
                    InputResult::info("Not connected.")
                }
            }
            "/models" => self.handle_models(),
            "/model" => self.handle_model(args),
            "/reset" => {
                self.reset();
                InputResult::info("Conversation cleared.")
            }
            "/suggest" => self.handle_suggest(args),
            "/history" => {
                self.rendered = 0;
                InputResult::None
            }
            "/chart" => self.handle_chart(args),
            _ => InputResult::error(format!(
                "Unknown command: {command}. Type /help for available commands."
            )),
        }
    }

    /// Appends the prompt, asks the analyst and records the outcome.
    ///
    /// Without a connected session the analyst is not called and the turn
    /// fails with [`ChatError::NotConnected`].
    pub async fn submit(&mut self, prompt: &str) {
        let bearer = self
            .gateway
            .handle()
            .filter(|h| h.is_valid())
            .map(SessionHandle::bearer);

        info!(model = %self.models.selected().display_name(), "Submitting question");
        self.conversation.begin_turn(prompt);

        let outcome = match bearer {
            Some(bearer) => {
                self.analyst
                    .ask(self.conversation.messages(), self.models.selected(), &bearer)
                    .await
            }
            None => Err(ChatError::NotConnected),
        };
        self.conversation.complete_turn(outcome);
    }

    /// Runs one cycle after input has been handled.
    ///
    /// Submits a pending suggestion, or applies the empty-conversation
    /// bootstrap/welcome logic.
    pub async fn cycle(&mut self) -> CycleAction {
        if let Some(suggestion) = self.conversation.take_suggestion() {
            self.submit(&suggestion).await;
            return CycleAction::Nothing;
        }

        let action = self.conversation.cycle(self.gateway.is_connected());
        if action == CycleAction::Bootstrap {
            self.submit(BOOTSTRAP_QUESTION).await;
        }
        action
    }

    /// Renders messages that have not been shown yet, running their SQL.
    pub async fn render_new_messages(&mut self) -> Vec<Line<'static>> {
        if self.rendered > self.conversation.len() {
            self.rendered = 0;
        }

        let mut lines = Vec::new();
        while let Some(message) = self.conversation.get(self.rendered) {
            let rendered = self
                .renderer
                .render_message(&mut self.gateway, message)
                .await;
            lines.extend(rendered.lines);
            lines.push(Line::default());
            if rendered.table.is_some() {
                self.last_table = rendered.table;
            }
            self.rendered += 1;
        }
        lines
    }

    /// Returns and clears the one-shot error notification.
    pub fn take_error_notification(&mut self) -> bool {
        self.conversation.take_error_notification()
    }

    /// Clears the conversation; the session is kept.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.rendered = 0;
        self.last_table = None;
    }

    /// Selects a semantic model by index. Changing the model resets the conversation.
    pub fn select_model(&mut self, index: usize) -> Result<bool> {
        let changed = self.models.select(index)?;
        if changed {
            info!(model = %self.models.selected().display_name(), "Semantic model changed");
            self.reset();
        }
        Ok(changed)
    }

    /// Marks suggestion `number` (1-based) of the latest suggestions as chosen.
    pub fn choose_suggestion(&mut self, number: usize) -> Result<String> {
        let suggestions = self
            .conversation
            .latest_suggestions()
            .ok_or_else(|| ChatError::internal("No suggestions available"))?;
        let suggestion = number
            .checked_sub(1)
            .and_then(|i| suggestions.get(i))
            .cloned()
            .ok_or_else(|| {
                ChatError::internal(format!(
                    "No suggestion #{number} (choose 1-{})",
                    suggestions.len()
                ))
            })?;
        self.conversation.select_suggestion(suggestion.clone());
        Ok(suggestion)
    }

    /// Connects with the resolved credentials.
    pub async fn connect(&mut self) -> Result<String> {
        let resolved = self.resolver.resolve();
        let connection = self
            .gateway
            .connect(&resolved.config)
            .await?
            .display_string()
            .to_string();

        if self.conversation.discard_welcome() {
            self.rendered = 0;
        }
        Ok(connection)
    }

    pub async fn disconnect(&mut self) {
        self.gateway.disconnect().await;
    }

    /// Builds a chart of the most recent result.
    pub fn chart(
        &self,
        x: Option<&str>,
        y: Option<&str>,
        kind: ChartKind,
    ) -> std::result::Result<String, ChartError> {
        let table = self.last_table.as_ref().ok_or(ChartError::NoResult)?;
        let spec = ChartSpec::build(table, x, y, kind)?;
        let display = self.renderer.display();
        Ok(spec.render_to_string(display.chart_width, display.chart_height))
    }

    fn handle_config(&self) -> InputResult {
        let resolved = self.resolver.resolve();
        let mut lines: Vec<Line<'static>> = vec![Line::styled(
            "Connection",
            Style::default().add_modifier(Modifier::BOLD),
        )];
        lines.extend(
            resolved
                .describe()
                .into_iter()
                .map(|l| Line::raw(format!("  {l}"))),
        );

        let state = match self.gateway.state() {
            SessionState::Absent => "not connected".to_string(),
            SessionState::Connecting => "connecting".to_string(),
            SessionState::Connected => match self.gateway.handle() {
                Some(handle) => format!("connected ({})", handle.display_string()),
                None => "connected".to_string(),
            },
            SessionState::Failed(reason) => format!("failed: {reason}"),
        };
        lines.push(Line::raw(format!("  {:<14} {state}", "Session")));
        lines.push(Line::raw(format!(
            "  {:<14} {}",
            "Model",
            self.models.selected().path()
        )));
        InputResult::Output(lines)
    }

    fn handle_set(&mut self, args: &str) -> InputResult {
        let Some((field, value)) = args.split_once(char::is_whitespace) else {
            return InputResult::error("Usage: /set <field> <value>");
        };
        let field = match CredentialField::from_str(field) {
            Ok(field) => field,
            Err(e) => return InputResult::error(e),
        };
        let value = value.trim();
        if value.is_empty() {
            return InputResult::error("Usage: /set <field> <value>");
        }

        self.resolver.interactive_mut().set(field, value);
        let shown = if field.is_secret() {
            mask_secret(value)
        } else {
            value.to_string()
        };
        InputResult::info(format!("{} set to {shown}.", field.label()))
    }

    fn handle_unset(&mut self, args: &str) -> InputResult {
        match CredentialField::from_str(args) {
            Ok(field) => {
                self.resolver.interactive_mut().unset(field);
                InputResult::info(format!("{} cleared.", field.label()))
            }
            Err(_) if args.is_empty() => InputResult::error("Usage: /unset <field>"),
            Err(e) => InputResult::error(e),
        }
    }

    fn handle_models(&self) -> InputResult {
        let selected = self.models.selected_index();
        let lines = self
            .models
            .models()
            .iter()
            .enumerate()
            .map(|(i, model)| {
                let marker = if i == selected { "*" } else { " " };
                let text = format!("{marker} [{}] {}  ({})", i + 1, model.display_name(), model.path());
                if i == selected {
                    Line::styled(text, Style::default().fg(Color::Cyan))
                } else {
                    Line::raw(text)
                }
            })
            .collect();
        InputResult::Output(lines)
    }

    fn handle_model(&mut self, args: &str) -> InputResult {
        if args.is_empty() {
            return InputResult::error("Usage: /model <n|name>");
        }
        let Some(index) = self.models.find(args) else {
            return InputResult::error(format!(
                "Unknown semantic model: {args}. Use /models to list them."
            ));
        };
        match self.select_model(index) {
            Ok(true) => InputResult::info(format!(
                "Switched to {}. Conversation cleared.",
                self.models.selected().display_name()
            )),
            Ok(false) => InputResult::info(format!(
                "Already using {}.",
                self.models.selected().display_name()
            )),
            Err(e) => InputResult::error(e.to_string()),
        }
    }

    fn handle_suggest(&mut self, args: &str) -> InputResult {
        let Ok(number) = args.parse::<usize>() else {
            return InputResult::error("Usage: /suggest <n>");
        };
        match self.choose_suggestion(number) {
            Ok(_) => InputResult::None,
            Err(ChatError::Internal(msg)) => InputResult::error(msg),
            Err(e) => InputResult::error(e.to_string()),
        }
    }

    fn handle_chart(&self, args: &str) -> InputResult {
        let mut tokens: Vec<&str> = args.split_whitespace().collect();
        let mut kind = ChartKind::default();
        if let Some(parsed) = tokens.last().and_then(|t| t.parse::<ChartKind>().ok()) {
            kind = parsed;
            tokens.pop();
        }
        if tokens.len() > 2 {
            return InputResult::error("Usage: /chart [x] [y] [line|bar]");
        }

        match self.chart(tokens.first().copied(), tokens.get(1).copied(), kind) {
            Ok(chart) => InputResult::info(chart),
            Err(e) => InputResult::error(e.to_string()),
        }
    }
}
