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
        .title(panel_title(Panel::ScreenshotDetail));

    let Some(shot) = app.current_screenshot() else {
        frame.render_widget(Paragraph::new(" Screenshot not found.").block(block), area);
        return hints(&[("Esc", "Back", true)]);
    };

    let label = Style::default().fg(Color::DarkGray);
    let url = app
        .screenshot_url(&shot.filename)
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" {}", shot.filename),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Created: ", label),
            Span::raw(format::format_time(Some(shot.modified))),
        ]),
        Line::from(vec![
            Span::styled(" URL:     ", label),
            Span::styled(
                url,
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Press o to view the image, w to save a copy.",
            label,
        )),
    ];

    let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    frame.render_widget(detail, area);

    let deleting = app.is_busy(Action::DeleteScreenshot);
    let saving = app.is_busy(Action::SaveScreenshot);
    hints(&[
        ("o", "Open", true),
        ("w", if saving { "Saving..." } else { "Save" }, !saving),
        ("d", if deleting { "Deleting..." } else { "Delete" }, !deleting),
        ("Esc", "Back", true),
    ])
}
