use super::{hints, panel_title, truncate_str};
use crate::app::{App, Load};
use crate::format;
use crate::router::Panel;
use crate::worker::Action;
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

pub fn render(app: &App, frame: &mut Frame, area: Rect) -> Line<'static> {
    let shots = app.sorted_screenshots();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(panel_title(Panel::Screenshots))
        .title_bottom(Line::from(format!(" {} screenshots ", shots.len())).alignment(Alignment::Right));

    let placeholder = match &app.screenshots_load {
        Load::Failed(e) => Some(Span::styled(
            format!(" Error loading screenshots: {e}"),
            Style::default().fg(Color::Red),
        )),
        Load::Idle | Load::Loading if shots.is_empty() => Some(Span::styled(
            " Loading screenshots...",
            Style::default().fg(Color::Yellow),
        )),
        _ if shots.is_empty() => Some(Span::styled(
            " No screenshots found.",
            Style::default().fg(Color::DarkGray),
        )),
        _ => None,
    };

    if let Some(text) = placeholder {
        frame.render_widget(Paragraph::new(text).block(block), area);
    } else {
        let name_width = (area.width as usize).saturating_sub(34).max(8);
        let items: Vec<ListItem> = shots
            .iter()
            .map(|shot| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!(
                        "{:<width$}",
                        truncate_str(&shot.filename, name_width),
                        width = name_width
                    )),
                    Span::styled(
                        format!("  Created: {}", format::format_time(Some(shot.modified))),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
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
        list_state.select(Some(app.screenshots_selected));
        frame.render_stateful_widget(list_widget, area, &mut list_state);
    }

    let all_busy = app.is_busy(Action::ScreenshotAll);
    let deleting = app.is_busy(Action::DeleteAllScreenshots);
    hints(&[
        ("↑↓", "Navigate", true),
        ("Enter", "Open", true),
        ("a", if all_busy { "Taking..." } else { "Screenshot All" }, !all_busy),
        ("D", if deleting { "Deleting..." } else { "Delete All" }, !deleting && !shots.is_empty()),
        ("r", "Reload", true),
        ("F", "Friends", true),
        ("q", "Quit", true),
    ])
}
