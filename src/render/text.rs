//! Plain-text conversion of ratatui buffers and lines.

use ratatui::buffer::Buffer;
use ratatui::text::Line;

/// Renders a buffer to text, one line per row, trailing blanks removed.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    if area.height == 0 {
        return String::new();
    }

    let mut lines: Vec<String> = (0..area.height)
        .map(|y| {
            let line: String = (area.x..area.x + area.width)
                .map(|x| {
                    buffer
                        .cell((x, area.y + y))
                        .map(|cell| cell.symbol())
                        .unwrap_or(" ")
                })
                .collect();
            line.trim_end_matches(' ').to_string()
        })
        .collect();

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    format!("{}\n", lines.join("\n"))
}

/// The unstyled content of a line.
pub fn plain_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;
    use ratatui::style::Style;
    use ratatui::text::Span;

    #[test]
    fn test_buffer_to_string_trims() {
        let mut buffer = Buffer::empty(Rect::new(0, 0, 6, 3));
        buffer.set_string(0, 0, "ab", Style::default());
        buffer.set_string(1, 1, "c", Style::default());

        assert_eq!(buffer_to_string(&buffer), "ab\n c\n");
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = Buffer::empty(Rect::new(0, 0, 4, 0));
        assert_eq!(buffer_to_string(&buffer), "");
    }

    #[test]
    fn test_plain_text() {
        let line = Line::from(vec![Span::raw("a"), Span::raw("bc")]);
        assert_eq!(plain_text(&line), "abc");
    }
}
