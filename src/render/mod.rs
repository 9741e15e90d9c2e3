//! Result rendering: runs generated SQL, summarizes small results and turns
//! conversation messages into styled lines.

pub mod chart;
pub mod summary;
pub mod table;
pub mod text;

pub use chart::{ChartError, ChartKind, ChartSpec};
pub use table::ResultTable;
pub use text::{buffer_to_string, plain_text};

use std::sync::Arc;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use tracing::{debug, warn};

use crate::analyst::{ContentItem, Message, Role};
use crate::config::{DisplaySettings, SummarySettings};
use crate::error::ChatError;
use crate::session::SessionGateway;
use crate::warehouse::Table;

/// Outcome of running a generated SQL statement.
#[derive(Debug, Clone)]
pub enum SqlView {
    NotConnected,
    Failed(String),
    NoData,
    Rows {
        table: Arc<Table>,
        summary: Option<String>,
    },
}

/// Styled lines for one message, plus the last table it produced.
#[derive(Debug, Default)]
pub struct RenderedMessage {
    pub lines: Vec<Line<'static>>,
    pub table: Option<Arc<Table>>,
}

#[derive(Debug, Clone)]
pub struct ResultRenderer {
    summary: SummarySettings,
    display: DisplaySettings,
}

impl ResultRenderer {
    pub fn new(summary: SummarySettings, display: DisplaySettings) -> Self {
        Self { summary, display }
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    /// Executes `sql` and, for small results, fetches a summary.
    ///
    /// Never fails: execution errors are part of the returned view, and a
    /// failed summary only drops the summary.
    pub async fn run_sql(&self, gateway: &mut SessionGateway, sql: &str) -> SqlView {
        if !gateway.is_connected() {
            return SqlView::NotConnected;
        }

        let table = match gateway.run_query(sql).await {
            Ok(table) => table,
            Err(ChatError::NotConnected) => return SqlView::NotConnected,
            Err(ChatError::Execution(detail)) => return SqlView::Failed(detail),
            Err(e) => return SqlView::Failed(e.to_string()),
        };

        if table.is_empty() {
            return SqlView::NoData;
        }

        let summary = if self.summary.enabled && table.row_count() <= self.summary.max_rows {
            self.summarize(gateway, sql).await
        } else {
            None
        };

        SqlView::Rows { table, summary }
    }

    async fn summarize(&self, gateway: &mut SessionGateway, sql: &str) -> Option<String> {
        let statement = summary::summary_sql(sql, &self.summary.model);
        debug!(model = %self.summary.model, "Requesting result summary");
        match gateway.run_query(&statement).await {
            Ok(table) => summary::extract_summary(&table),
            Err(e) => {
                warn!(error = %e, "Result summary failed");
                None
            }
        }
    }

    /// Lines describing a SQL outcome.
    pub fn sql_view_lines(&self, view: &SqlView) -> Vec<Line<'static>> {
        let error = Style::default().fg(Color::Red);
        let dim = Style::default().fg(Color::DarkGray);

        match view {
            SqlView::NotConnected => vec![Line::styled(ChatError::NotConnected.to_string(), error)],
            SqlView::Failed(detail) => vec![Line::styled(
                format!("Could not execute generated SQL query. Error: {detail}"),
                error,
            )],
            SqlView::NoData => vec![Line::styled("Query returned no data", dim)],
            SqlView::Rows { table, summary } => {
                let mut lines = Vec::new();
                if let Some(summary) = summary {
                    lines.push(Line::styled(
                        "Insights",
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                    lines.extend(summary.lines().map(|l| Line::raw(l.to_string())));
                    lines.push(Line::default());
                }
                lines.extend(ResultTable::new(table, self.display.max_rows).render_to_lines());
                if table.coerced {
                    lines.push(Line::styled(
                        "Note: NULL and non-finite numeric values are shown as 0.",
                        Style::default().fg(Color::Yellow),
                    ));
                }
                if table.columns.len() >= 2 {
                    lines.push(Line::styled(
                        "Use /chart [x] [y] [line|bar] to plot this result.",
                        dim,
                    ));
                }
                lines
            }
        }
    }

    /// Renders a message, running any SQL it contains.
    pub async fn render_message(
        &self,
        gateway: &mut SessionGateway,
        message: &Message,
    ) -> RenderedMessage {
        let mut rendered = RenderedMessage {
            lines: vec![message_header(message)],
            table: None,
        };

        for item in &message.content {
            match item {
                ContentItem::Text { text } => {
                    rendered
                        .lines
                        .extend(text.lines().map(|l| Line::raw(l.to_string())));
                }
                ContentItem::Suggestions { suggestions } => {
                    rendered.lines.push(Line::styled(
                        "Suggestions (/suggest <n>):",
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                    for (i, suggestion) in suggestions.iter().enumerate() {
                        rendered.lines.push(Line::from(vec![
                            Span::styled(
                                format!("  [{}] ", i + 1),
                                Style::default().fg(Color::Cyan),
                            ),
                            Span::raw(suggestion.clone()),
                        ]));
                    }
                }
                ContentItem::Sql { statement } => {
                    rendered.lines.push(Line::styled(
                        "SQL Query",
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                    rendered.lines.extend(statement.lines().map(|l| {
                        Line::styled(format!("  {l}"), Style::default().fg(Color::Yellow))
                    }));

                    let view = self.run_sql(gateway, statement).await;
                    rendered.lines.extend(self.sql_view_lines(&view));
                    if let SqlView::Rows { table, .. } = view {
                        rendered.table = Some(table);
                    }
                }
                ContentItem::Error { text } => {
                    let text = if text.is_empty() {
                        "Unknown error occurred"
                    } else {
                        text
                    };
                    let style = Style::default().fg(Color::Red);
                    rendered
                        .lines
                        .extend(text.lines().map(|l| Line::styled(l.to_string(), style)));
                }
                ContentItem::Unknown(value) => {
                    rendered.lines.push(Line::styled(
                        format!("Unsupported content type '{}':", item.type_name()),
                        Style::default().fg(Color::Yellow),
                    ));
                    let pretty =
                        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                    rendered.lines.extend(pretty.lines().map(|l| {
                        Line::styled(l.to_string(), Style::default().fg(Color::DarkGray))
                    }));
                }
            }
        }

        rendered
    }
}

fn message_header(message: &Message) -> Line<'static> {
    let (label, color) = match message.role {
        Role::User => ("You", Color::Green),
        Role::Analyst => ("Analyst", Color::Cyan),
    };
    let mut spans = vec![Span::styled(
        format!("▌ {label}"),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if let Some(id) = &message.request_id {
        spans.push(Span::styled(
            format!("  (request {id})"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
