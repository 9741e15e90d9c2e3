//! Line and bar charts of query results, drawn with ratatui into a buffer.

use std::fmt;
use std::str::FromStr;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Widget},
};
use thiserror::Error;

use super::text::buffer_to_string;
use crate::warehouse::Table;

/// Bars are scaled so the tallest one has this value.
const BAR_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            other => Err(ChartError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Bar => write!(f, "bar"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("At least 2 columns are required")]
    TooFewColumns,

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("The Y axis column must differ from the X axis column")]
    SameColumn,

    #[error("Unknown chart type '{0}' (expected line or bar)")]
    UnknownKind(String),

    #[error("No numeric values to plot")]
    NoNumericValues,

    #[error("No query result to chart yet")]
    NoResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// A chart built from two columns of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_column: String,
    pub points: Vec<ChartPoint>,
    numeric_x: bool,
}

impl ChartSpec {
    /// Picks the axes and extracts plottable points.
    ///
    /// Defaults to the first column for x and the first other column for y.
    /// Rows whose y value is not numeric are skipped.
    pub fn build(
        table: &Table,
        x: Option<&str>,
        y: Option<&str>,
        kind: ChartKind,
    ) -> Result<Self, ChartError> {
        if table.columns.len() < 2 {
            return Err(ChartError::TooFewColumns);
        }

        let x_idx = match x {
            Some(name) => table
                .column_index(name)
                .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))?,
            None => 0,
        };
        let y_idx = match y {
            Some(name) => table
                .column_index(name)
                .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))?,
            None => (0..table.columns.len())
                .find(|&i| i != x_idx)
                .ok_or(ChartError::TooFewColumns)?,
        };
        if x_idx == y_idx {
            return Err(ChartError::SameColumn);
        }

        let numeric_x = table.rows.iter().all(|row| row[x_idx].as_f64().is_some());
        let points: Vec<ChartPoint> = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(position, row)| {
                let y = row[y_idx].as_f64()?;
                let x_value = &row[x_idx];
                let x = if numeric_x {
                    x_value.as_f64()?
                } else {
                    position as f64
                };
                Some(ChartPoint {
                    label: x_value.to_display_string(),
                    x,
                    y,
                })
            })
            .collect();

        if points.is_empty() {
            return Err(ChartError::NoNumericValues);
        }

        Ok(Self {
            kind,
            x_column: table.columns[x_idx].name.clone(),
            y_column: table.columns[y_idx].name.clone(),
            points,
            numeric_x,
        })
    }

    fn title(&self) -> String {
        format!(" {} by {} ", self.y_column, self.x_column)
    }

    /// Draws the chart into a new buffer of the given size.
    pub fn render(&self, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        match self.kind {
            ChartKind::Line => self.render_line(area, &mut buffer),
            ChartKind::Bar => self.render_bar(area, &mut buffer),
        }
        buffer
    }

    pub fn render_to_string(&self, width: u16, height: u16) -> String {
        buffer_to_string(&self.render(width, height))
    }

    fn render_line(&self, area: Rect, buffer: &mut Buffer) {
        let data: Vec<(f64, f64)> = self.points.iter().map(|p| (p.x, p.y)).collect();
        let (x_min, x_max) = padded_bounds(data.iter().map(|(x, _)| *x));
        let (y_min, y_max) = padded_bounds(data.iter().map(|(_, y)| *y));

        let x_labels: Vec<Span<'static>> = if self.numeric_x {
            vec![
                Span::raw(format_number(x_min)),
                Span::raw(format_number(x_max)),
            ]
        } else {
            let first = self.points.first().map(|p| p.label.clone());
            let last = self.points.last().map(|p| p.label.clone());
            first.into_iter().chain(last).map(Span::raw).collect()
        };
        let y_labels = vec![
            Span::raw(format_number(y_min)),
            Span::raw(format_number((y_min + y_max) / 2.0)),
            Span::raw(format_number(y_max)),
        ];

        let dataset = Dataset::default()
            .name(self.y_column.clone())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&data);

        Chart::new(vec![dataset])
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title()),
            )
            .x_axis(
                Axis::default()
                    .title(self.x_column.clone())
                    .style(Style::default().fg(Color::Gray))
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title(self.y_column.clone())
                    .style(Style::default().fg(Color::Gray))
                    .bounds([y_min, y_max])
                    .labels(y_labels),
            )
            .render(area, buffer);
    }

    fn render_bar(&self, area: Rect, buffer: &mut Buffer) {
        let max = self
            .points
            .iter()
            .map(|p| p.y)
            .fold(0.0_f64, f64::max);
        let scale = if max > 0.0 { BAR_SCALE / max } else { 0.0 };

        let bars: Vec<Bar> = self
            .points
            .iter()
            .map(|p| {
                let value = if p.y > 0.0 {
                    (p.y * scale).round() as u64
                } else {
                    0
                };
                Bar::default()
                    .value(value)
                    .text_value(format_number(p.y.max(0.0)))
                    .label(Line::from(p.label.clone()))
            })
            .collect();

        let inner_width = area.width.saturating_sub(2) as usize;
        let count = self.points.len().max(1);
        let bar_width = (inner_width / count).saturating_sub(1).clamp(1, 12) as u16;

        BarChart::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title()),
            )
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .render(area, buffer);
    }
}

/// Axis bounds with a little headroom; a flat series gets a unit range.
fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    (min, max)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}
