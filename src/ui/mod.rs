mod confirm;
mod friend_detail;
mod friends;
mod help;
mod screenshot_detail;
mod screenshots;

pub use confirm::{ConfirmInput, read_key as read_confirm_key};

use crate::app::{App, StatusKind};
use crate::format;
use crate::router::Panel;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthChar;

/// Top-level render dispatch.
pub fn render(app: &App, frame: &mut Frame) {
    // Layout: header(3) + panel(min) + status(1) + hints(1)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(app, frame, chunks[0]);

    let panel = app.panel();
    let hints = match panel {
        Panel::Friends => friends::render(app, frame, chunks[1]),
        Panel::FriendDetail => friend_detail::render(app, frame, chunks[1]),
        Panel::Screenshots => screenshots::render(app, frame, chunks[1]),
        Panel::ScreenshotDetail => screenshot_detail::render(app, frame, chunks[1]),
    };

    render_status(app, panel, frame, chunks[2]);
    frame.render_widget(Paragraph::new(hints), chunks[3]);

    if let Some(confirm) = &app.confirm {
        confirm::render(&confirm.prompt(), frame);
    }

    // Render help overlay on top if active
    if app.show_help {
        help::render(frame);
    }
}

/// Title of a panel's main block.
pub fn panel_title(panel: Panel) -> &'static str {
    match panel {
        Panel::Friends => " Friends List ",
        Panel::FriendDetail => " Friend Detail ",
        Panel::Screenshots => " Screenshots List ",
        Panel::ScreenshotDetail => " Screenshot Detail ",
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let selected = app.selected_friend.as_deref().unwrap_or("None");
    let line = Line::from(vec![
        Span::styled(
            " Find My Friends",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("   [{} friends]", app.friends.len()), dim),
        Span::styled("   Last sync: ", dim),
        Span::raw(format::time_ago(app.last_sync, format::unix_now())),
        Span::styled("   Showing: ", dim),
        Span::styled(selected.to_string(), Style::default().fg(Color::Green)),
    ]);

    let arrow = |enabled: bool| if enabled { Style::default().fg(Color::Cyan) } else { dim };
    let location = Line::from(vec![
        Span::styled(" ◂ ", arrow(app.can_go_back())),
        Span::raw(app.location()),
        Span::styled(" ▸ ", arrow(app.can_go_forward())),
    ])
    .alignment(Alignment::Right);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(dim)
            .title(location),
    );
    frame.render_widget(header, area);
}

fn render_status(app: &App, panel: Panel, frame: &mut Frame, area: Rect) {
    let Some(status) = app.status(panel) else {
        return;
    };
    let style = match status.kind {
        StatusKind::Loading => Style::default().fg(Color::Yellow),
        StatusKind::Success => Style::default().fg(Color::Green),
        StatusKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    };
    let text = truncate_str(&format!(" {}", status.text), area.width as usize);
    frame.render_widget(Paragraph::new(Span::styled(text, style)), area);
}

/// Key hint line: each key in bold cyan followed by its label.
/// Disabled entries are dimmed.
pub fn hints(items: &[(&str, &str, bool)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(items.len() * 2);
    for (i, (key, label, enabled)) in items.iter().enumerate() {
        let lead = if i == 0 { " " } else { "" };
        let (key_style, label_style) = if *enabled {
            (
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                Style::default(),
            )
        } else {
            let dim = Style::default().fg(Color::DarkGray);
            (dim, dim)
        };
        spans.push(Span::styled(format!("{lead}{key}"), key_style));
        spans.push(Span::styled(format!(" {label}  "), label_style));
    }
    Line::from(spans)
}

/// Truncate a string to `max_width` terminal columns, adding "…" if truncated.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if unicode_width::UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(1);
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        result.push(c);
    }
    if max_width > 0 {
        result.push('…');
    }
    result
}
