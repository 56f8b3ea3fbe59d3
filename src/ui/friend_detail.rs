use super::{hints, panel_title};
use crate::app::App;
use crate::format;
use crate::router::Panel;
use crate::worker::Action;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

pub fn render(app: &App, frame: &mut Frame, area: Rect) -> Line<'static> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(panel_title(Panel::FriendDetail));

    let Some(friend) = app.current_friend() else {
        frame.render_widget(Paragraph::new(" Friend not found.").block(block), area);
        return hints(&[("Esc", "Back", true)]);
    };

    let label = Style::default().fg(Color::DarkGray);
    let selected = app.is_current_friend_selected();
    let favorite = app.favorites.is_favorite(&friend.name);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" {}", friend.name),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Selected:        ", label),
            if selected {
                Span::styled("Yes ✓", Style::default().fg(Color::Green))
            } else {
                Span::raw("No")
            },
        ]),
        Line::from(vec![
            Span::styled(" Favorite:        ", label),
            if favorite {
                Span::styled("★ Yes", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("No")
            },
        ]),
        Line::from(vec![
            Span::styled(" Last screenshot: ", label),
            Span::raw(
                friend
                    .last_screenshot
                    .clone()
                    .unwrap_or_else(|| "None".to_string()),
            ),
        ]),
        Line::from(vec![
            Span::styled(" Taken:           ", label),
            Span::raw(format::format_time(friend.last_screenshot_time)),
            Span::styled(
                format!(
                    "  ({})",
                    format::time_ago(friend.last_screenshot_time, format::unix_now())
                ),
                label,
            ),
        ]),
    ];

    if !selected {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Select this friend on the backend before taking a screenshot.",
            Style::default().fg(Color::Yellow),
        )));
    }

    let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    frame.render_widget(detail, area);

    let selecting = app.is_busy(Action::SelectFriend);
    let shooting = app.is_busy(Action::TakeScreenshot);
    let has_shot = friend.last_screenshot.is_some();
    let select_label = match (selecting, selected) {
        (true, _) => "Selecting...",
        (false, true) => "Re-select Friend",
        (false, false) => "Select Friend",
    };
    let shot_label = match (shooting, selected) {
        (true, _) => "Taking...",
        (false, true) => "Take Screenshot",
        (false, false) => "Select Friend First",
    };
    hints(&[
        ("e", select_label, !selecting),
        ("p", shot_label, selected && !shooting),
        ("f", if favorite { "Unfavorite" } else { "Favorite" }, true),
        ("v", "View Screenshot", has_shot),
        ("o", "Open", has_shot),
        ("Esc", "Back", true),
    ])
}
