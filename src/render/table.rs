//! Result tables as styled text lines.
//!
//! Column widths are sized to content and capped, NULL values are dimmed,
//! and only the first `max_rows` rows are shown.

use crate::warehouse::{Table, Value};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// Renders a materialized table.
pub struct ResultTable<'a> {
    table: &'a Table,
    max_rows: usize,
}

impl<'a> ResultTable<'a> {
    pub fn new(table: &'a Table, max_rows: usize) -> Self {
        Self { table, max_rows }
    }

    fn visible_rows(&self) -> &'a [Vec<Value>] {
        let shown = self.table.rows.len().min(self.max_rows);
        &self.table.rows[..shown]
    }

    /// Calculates the width of each column from its header and visible cells.
    fn calculate_column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .table
            .columns
            .iter()
            .map(|col| col.name.chars().count().max(MIN_COLUMN_WIDTH))
            .collect();

        for row in self.visible_rows() {
            for (width, value) in widths.iter_mut().zip(row) {
                *width = (*width).max(value.to_display_string().chars().count());
            }
        }

        widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
    }

    /// Truncates to `max_width` characters, adding an ellipsis if needed.
    fn truncate(s: &str, max_width: usize) -> String {
        let len = s.chars().count();
        if len <= max_width {
            s.to_string()
        } else if max_width <= 3 {
            s.chars().take(max_width).collect()
        } else {
            let head: String = s.chars().take(max_width - 3).collect();
            format!("{head}...")
        }
    }

    fn pad(s: &str, width: usize) -> String {
        let fill = width.saturating_sub(s.chars().count());
        format!(" {s}{} ", " ".repeat(fill))
    }

    pub fn render_to_lines(&self) -> Vec<Line<'static>> {
        let dim = Style::default().fg(Color::DarkGray);

        if self.table.columns.is_empty() {
            return vec![Line::from(Span::styled("(empty result)", dim))];
        }

        let widths = self.calculate_column_widths();
        let mut lines = vec![
            Self::border(&widths, '┌', '┬', '┐'),
            self.header_row(&widths),
            Self::border(&widths, '├', '┼', '┤'),
        ];
        lines.extend(
            self.visible_rows()
                .iter()
                .map(|row| Self::data_row(row, &widths)),
        );
        lines.push(Self::border(&widths, '└', '┴', '┘'));

        let total = self.table.row_count();
        let shown = self.visible_rows().len();
        let mut footer = format!(
            "{} row{} returned ({}ms)",
            total,
            if total == 1 { "" } else { "s" },
            self.table.execution_time.as_millis()
        );
        if shown < total {
            footer.push_str(&format!(", showing first {shown}"));
        }
        lines.push(Line::from(Span::styled(footer, dim)));

        lines
    }

    fn border(widths: &[usize], left: char, mid: char, right: char) -> Line<'static> {
        let inner: Vec<String> = widths.iter().map(|&w| "─".repeat(w + 2)).collect();
        let border = format!("{left}{}{right}", inner.join(&mid.to_string()));
        Line::from(Span::styled(border, Style::default().fg(Color::DarkGray)))
    }

    fn header_row(&self, widths: &[usize]) -> Line<'static> {
        let separator = Style::default().fg(Color::DarkGray);
        let mut spans = vec![Span::styled("│", separator)];

        for (col, &width) in self.table.columns.iter().zip(widths) {
            spans.push(Span::styled(
                Self::pad(&Self::truncate(&col.name, width), width),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled("│", separator));
        }

        Line::from(spans)
    }

    fn data_row(row: &[Value], widths: &[usize]) -> Line<'static> {
        let separator = Style::default().fg(Color::DarkGray);
        let mut spans = vec![Span::styled("│", separator)];

        for (value, &width) in row.iter().zip(widths) {
            let display = Self::truncate(&value.to_display_string(), width);
            let style = if value.is_null() {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC)
            } else {
                Style::default()
            };
            spans.push(Span::styled(Self::pad(&display, width), style));
            spans.push(Span::styled("│", separator));
        }

        Line::from(spans)
    }
}
