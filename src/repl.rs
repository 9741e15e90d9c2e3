//! Line-oriented chat loop.
//!
//! Reads one line at a time from stdin, hands it to the orchestrator and
//! prints whatever the cycle produced. Styled lines are written with
//! crossterm when stdout is a terminal and as plain text otherwise.

use std::io::{self, IsTerminal, Write};

use cortex_chat::app::{InputResult, Orchestrator};
use cortex_chat::render::plain_text;
use crossterm::queue;
use crossterm::style::{
    Attribute, Color as TermColor, ContentStyle, PrintStyledContent, StyledContent,
};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const PROMPT: &str = "> ";
const ERROR_NOTIFICATION: &str = "🚨 An API error has occurred!";

/// Runs the chat loop until `/quit`, end of input or Ctrl-C.
pub async fn run(orchestrator: &mut Orchestrator) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let styled = out.is_terminal();

    print_lines(&mut out, &banner(orchestrator), styled)?;
    let lines = after_cycle(orchestrator).await;
    print_lines(&mut out, &lines, styled)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let line = tokio::select! {
            line = input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                writeln!(out)?;
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match orchestrator.handle_input(&line).await {
            InputResult::Exit => break,
            InputResult::Output(lines) => print_lines(&mut out, &lines, styled)?,
            InputResult::None => {}
        }

        let lines = after_cycle(orchestrator).await;
        print_lines(&mut out, &lines, styled)?;
    }

    info!("Leaving chat loop");
    orchestrator.disconnect().await;
    Ok(())
}

/// Runs one cycle and collects the output it produced.
pub async fn after_cycle(orchestrator: &mut Orchestrator) -> Vec<Line<'static>> {
    orchestrator.cycle().await;
    let mut lines = orchestrator.render_new_messages().await;
    if orchestrator.take_error_notification() {
        lines.push(error_notification());
    }
    lines
}

fn banner(orchestrator: &Orchestrator) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);
    vec![
        Line::styled("Cortex Analyst", bold),
        Line::styled(
            format!(
                "Semantic model: {}. Type /help for commands.",
                orchestrator.models().selected().display_name()
            ),
            dim,
        ),
        Line::default(),
    ]
}

fn error_notification() -> Line<'static> {
    Line::styled(
        ERROR_NOTIFICATION,
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )
}

/// Writes lines to `out`, applying span styles when `styled` is set.
pub fn print_lines<W: Write>(out: &mut W, lines: &[Line<'_>], styled: bool) -> io::Result<()> {
    for line in lines {
        if styled {
            for span in &line.spans {
                let style = to_content_style(line.style.patch(span.style));
                queue!(
                    out,
                    PrintStyledContent(StyledContent::new(style, span.content.as_ref()))
                )?;
            }
            writeln!(out)?;
        } else {
            writeln!(out, "{}", plain_text(line))?;
        }
    }
    out.flush()
}

fn to_content_style(style: Style) -> ContentStyle {
    let mut content = ContentStyle::new();
    content.foreground_color = style.fg.and_then(to_term_color);
    content.background_color = style.bg.and_then(to_term_color);

    let modifiers = [
        (Modifier::BOLD, Attribute::Bold),
        (Modifier::DIM, Attribute::Dim),
        (Modifier::ITALIC, Attribute::Italic),
        (Modifier::UNDERLINED, Attribute::Underlined),
        (Modifier::REVERSED, Attribute::Reverse),
    ];
    for (modifier, attribute) in modifiers {
        if style.add_modifier.contains(modifier) {
            content.attributes.set(attribute);
        }
    }
    content
}

fn to_term_color(color: Color) -> Option<TermColor> {
    let mapped = match color {
        Color::Reset => return None,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
        Color::Indexed(i) => TermColor::AnsiValue(i),
    };
    Some(mapped)
}
