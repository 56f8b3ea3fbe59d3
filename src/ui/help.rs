use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Global",
        &[
            ("?", "Toggle this help"),
            ("q", "Quit (lists) / back (details)"),
            ("Esc", "Back"),
            ("]", "Forward"),
            ("F / S", "Go to friends / screenshots"),
            ("r", "Reload current list"),
            ("Ctrl+C", "Quit application"),
        ],
    ),
    (
        "Friends",
        &[
            ("↑/k ↓/j", "Navigate up/down"),
            ("g/G", "Jump to first/last"),
            ("Enter", "Open friend"),
            ("f", "Toggle favorite"),
            ("s", "Sync friends from Find My"),
            ("/", "Filter (* and ? wildcards)"),
        ],
    ),
    (
        "Friend",
        &[
            ("e", "Select friend on the backend"),
            ("p", "Take screenshot (friend must be selected)"),
            ("v", "View last screenshot"),
            ("o", "Open last screenshot in system viewer"),
        ],
    ),
    (
        "Screenshots",
        &[
            ("Enter", "Open screenshot"),
            ("a", "Screenshot all friends"),
            ("D", "Delete all screenshots"),
            ("d", "Delete screenshot (detail)"),
            ("o / w", "Open externally / save to downloads (detail)"),
        ],
    ),
];

pub fn render(frame: &mut Frame) {
    let area = centered_rect(70, 80, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, area);

    let mut help_text = vec![Line::from("")];
    for (section, keys) in SECTIONS {
        help_text.push(Line::from(Span::styled(
            format!("  {section}"),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for (key, action) in *keys {
            help_text.push(Line::from(vec![
                Span::styled(format!("    {key:<10}"), Style::default().fg(Color::Yellow)),
                Span::raw(*action),
            ]));
        }
        help_text.push(Line::from(""));
    }

    let help = Paragraph::new(help_text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help: Keybindings ")
                .title_bottom(Line::from(" Press ? or Esc to close ").style(Style::default().fg(Color::DarkGray))),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(help, area);
}

/// Create a centered rectangle using percentage of parent area.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
