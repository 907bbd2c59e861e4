use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::api::Mode;
use crate::app::{App, QUICK_PROMPTS};
use crate::panel::format_score;
use crate::transcript::{MessageEntry, Role};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Context side panel splits the body when visible; toggling it never
    // touches the transcript or the panel's content.
    if app.panel.is_visible() {
        let [chat_area, panel_area] =
            Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
                .areas(body_area);
        render_transcript(app, frame, chat_area);
        render_context_panel(app, frame, panel_area);
    } else {
        render_transcript(app, frame, body_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let context_count = app.panel.chunks().len();
    let context_indicator = if context_count > 0 {
        format!(" [{} context chunks]", context_count)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(
            " Construction Docs Assistant ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(context_indicator, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn mode_badge(mode: Mode) -> Span<'static> {
    match mode {
        Mode::Online => Span::styled(
            "⚡ Online Mode",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Mode::Offline => Span::styled(
            "💻 Offline Mode",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    }
}

fn entry_lines(entry: &MessageEntry, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match entry.role {
        Role::User => {
            // Right-aligned with a trailing avatar on the first line.
            let mut first = true;
            for text_line in entry.text.lines() {
                let line = if first {
                    first = false;
                    Line::from(vec![
                        Span::styled(text_line.to_string(), Style::default().fg(Color::Cyan)),
                        Span::raw(" 👤"),
                    ])
                } else {
                    Line::from(Span::styled(
                        text_line.to_string(),
                        Style::default().fg(Color::Cyan),
                    ))
                };
                lines.push(line.alignment(Alignment::Right));
            }
        }
        Role::Assistant => {
            if entry.placeholder {
                lines.push(Line::from(Span::raw("🤖")));
                let dots = ".".repeat((animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("{}{}", entry.text, dots),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            } else {
                // Avatar line carries the mode badge when the entry has one;
                // error entries (mode None) never show a badge.
                let mut avatar_spans = vec![Span::raw("🤖")];
                if let Some(mode) = entry.mode {
                    avatar_spans.push(Span::raw(" "));
                    avatar_spans.push(mode_badge(mode));
                }
                lines.push(Line::from(avatar_spans));
                for text_line in entry.text.lines() {
                    lines.push(Line::from(text_line.to_string()));
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn welcome_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome! Ask about construction policies, FAQs, and specifications.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Sample questions (Ctrl-P to cycle):",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    for prompt in QUICK_PROMPTS {
        lines.push(Line::from(Span::styled(
            format!("  • {prompt}"),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);

    let lines: Vec<Line> = if app.transcript.show_welcome() {
        welcome_lines()
    } else {
        app.transcript
            .entries()
            .flat_map(|entry| entry_lines(entry, app.animation_frame))
            .collect()
    };

    // Wrap-aware line estimate, used to pin the view to the newest entry.
    let wrap_width = if inner_width > 0 { inner_width as usize } else { 50 };
    let total_lines: u16 = lines
        .iter()
        .map(|line| {
            let text: String = line
                .spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect();
            wrapped_line_count(&text, wrap_width)
        })
        .sum();

    app.transcript_height = inner_height;
    app.transcript_total_lines = total_lines;
    if app.stick_to_bottom {
        app.transcript_scroll = total_lines.saturating_sub(inner_height);
    }

    let transcript = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.transcript_scroll, 0));

    frame.render_widget(transcript, area);
}

/// Lines a paragraph line occupies after word wrapping at `width`. Mirrors
/// the renderer's greedy word wrap: a word that would overflow moves to the
/// next line whole, and words longer than the width are split.
fn wrapped_line_count(text: &str, width: usize) -> u16 {
    if width == 0 {
        return 1;
    }
    let mut lines: u16 = 1;
    let mut current = 0usize;
    for word in text.split_whitespace() {
        let mut len = word.chars().count();
        if current > 0 {
            if current + 1 + len <= width {
                current += 1 + len;
                continue;
            }
            lines += 1;
            current = 0;
        }
        while len > width {
            lines += 1;
            len -= width;
        }
        current = len;
    }
    lines
}

fn render_context_panel(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(format!(" Retrieved Context ({}) ", app.panel.chunks().len()));

    // Explicit empty state, never a bare container.
    if app.panel.is_empty() {
        let placeholder = Paragraph::new("No context retrieved.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for chunk in app.panel.chunks() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("📄 {}", chunk.source),
                Style::default().fg(Color::Yellow).bold(),
            ),
            Span::styled(
                format!("  score {}", format_score(chunk.score)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for text_line in chunk.text.lines() {
            lines.push(Line::from(text_line.to_string()));
        }
        lines.push(Line::default());
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(panel, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    // The border doubles as the submission-control indicator: dimmed while
    // a turn is pending, since Enter is gated until it resolves.
    let (title, border_color) = if app.turn_in_flight() {
        (" Waiting for answer... ", Color::DarkGray)
    } else {
        (" Ask a question (Enter to send) ", Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor visible in a single-line editor.
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    frame.set_cursor_position((area.x + (cursor_pos - scroll_offset) as u16 + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_color = match app.mode {
        Mode::Online => Color::Green,
        Mode::Offline => Color::Yellow,
    };

    let mut spans = vec![
        Span::styled(" mode: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.mode.label(),
            Style::default().fg(mode_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " (^T)  Tab context  ^R rebuild index  ^P sample  ^C quit",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(status) = &app.ingest_status {
        spans.push(Span::raw("  "));
        let status_color = if app.ingest_running {
            Color::Yellow
        } else {
            Color::Cyan
        };
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(status_color),
        ));
    }

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}
