use super::{hints, panel_title, truncate_str};
use crate::app::{App, FRIENDS_LOAD_ERROR, InputMode, Load};
use crate::format;
use crate::router::Panel;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use unicode_width::UnicodeWidthStr;

pub fn render(app: &App, frame: &mut Frame, area: Rect) -> Line<'static> {
    // Layout: filter(3) + list(min)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    // ── Filter bar ──
    let filter_style = match app.input_mode {
        InputMode::Editing => Style::default().fg(Color::Yellow),
        InputMode::Normal => Style::default().fg(Color::DarkGray),
    };
    let filter_label = if app.input_mode == InputMode::Editing {
        " Filter (Enter to apply, Esc to clear): "
    } else {
        " Filter (/): "
    };
    let filter_bar = Paragraph::new(format!("{filter_label}{}", app.filter))
        .style(filter_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(filter_style)
                .title(" Search "),
        );
    frame.render_widget(filter_bar, chunks[0]);

    if app.input_mode == InputMode::Editing {
        let cursor_x = chunks[0].x + 1 + (filter_label.width() + app.filter.width()) as u16;
        frame.set_cursor_position((cursor_x, chunks[0].y + 1));
    }

    // ── List ──
    let rows = app.visible_friends();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(panel_title(Panel::Friends))
        .title_bottom(
            Line::from(format!(" {} of {} ", rows.len(), app.friends.len()))
                .alignment(Alignment::Right),
        );

    let placeholder = match &app.friends_load {
        Load::Failed(e) if app.friends.is_empty() => {
            Some(Span::styled(format!(" {FRIENDS_LOAD_ERROR}: {e}"), Style::default().fg(Color::Red)))
        }
        Load::Idle | Load::Loading if app.friends.is_empty() => Some(Span::styled(
            " Loading friends...",
            Style::default().fg(Color::Yellow),
        )),
        _ if app.friends.is_empty() => Some(Span::styled(
            " No friends found. Try syncing first.",
            Style::default().fg(Color::DarkGray),
        )),
        _ if rows.is_empty() => Some(Span::styled(
            " No friends match the filter.",
            Style::default().fg(Color::DarkGray),
        )),
        _ => None,
    };

    if let Some(text) = placeholder {
        frame.render_widget(Paragraph::new(text).block(block), chunks[1]);
    } else {
        let now = format::unix_now();
        let name_width = (chunks[1].width as usize).saturating_sub(40).max(8);
        let items: Vec<ListItem> = rows
            .iter()
            .map(|row| {
                let star = if row.favorite { "★ " } else { "  " };
                let check = if row.selected { "✓ " } else { "  " };
                let line = Line::from(vec![
                    Span::styled(star, Style::default().fg(Color::Yellow)),
                    Span::styled(check, Style::default().fg(Color::Green)),
                    Span::styled(
                        format!(
                            "{:<width$}",
                            truncate_str(&row.friend.name, name_width),
                            width = name_width
                        ),
                        if row.selected {
                            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        },
                    ),
                    Span::styled(
                        format!(
                            "  Last screenshot: {}",
                            format::time_ago(row.friend.last_screenshot_time, now)
                        ),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]);
                ListItem::new(line)
            })
            .collect();

        let list_widget = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▸ ");

        let mut list_state = ListState::default();
        list_state.select(Some(app.friends_selected));
        frame.render_stateful_widget(list_widget, chunks[1], &mut list_state);
    }

    let syncing = app.is_busy(crate::worker::Action::Sync);
    hints(&[
        ("↑↓", "Navigate", true),
        ("Enter", "Open", true),
        ("f", "Favorite", true),
        ("s", if syncing { "Syncing..." } else { "Sync" }, !syncing),
        ("/", "Filter", true),
        ("S", "Screenshots", true),
        ("?", "Help", true),
        ("q", "Quit", true),
    ])
}
