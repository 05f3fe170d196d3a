use chopmeter_engine::ReadingSource;
use chrono::Local;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

use crate::AppState;

pub struct HistoryPopupWidget;

impl HistoryPopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let popup_area = centered_rect(60, 70, area);

        // Clear the area first
        frame.render_widget(Clear, popup_area);

        let history_text = Self::create_history_text(state);

        let popup = Paragraph::new(history_text)
            .block(
                Block::bordered()
                    .title("Recent Readings (7 days)")
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Cyan)),
            )
            .alignment(Alignment::Left);

        frame.render_widget(popup, popup_area);
    }

    fn create_history_text(state: &AppState) -> Vec<Line<'static>> {
        let mut history_text = Vec::new();

        if state.recent_readings.is_empty() {
            history_text.push(Line::from(vec![Span::styled(
                "No readings this week",
                Style::default().fg(Color::Gray),
            )]));
        }

        for reading in &state.recent_readings {
            let marker = match reading.source() {
                ReadingSource::Optical => "[scan]  ",
                ReadingSource::Manual => "[manual]",
            };
            history_text.push(Line::from(vec![
                Span::styled(
                    reading
                        .timestamp()
                        .with_timezone(&Local)
                        .format("%a %d %b %H:%M  ")
                        .to_string(),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>10.1} kWh  ", reading.value()),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(marker, Style::default().fg(Color::Gray)),
            ]));
        }

        history_text.extend(vec![
            Line::from(" "),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled(
                    "h",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" to close", Style::default().fg(Color::Gray)),
            ]),
        ]);

        history_text
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = ratatui::layout::Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            ratatui::layout::Constraint::Percentage((100 - percent_y) / 2),
            ratatui::layout::Constraint::Percentage(percent_y),
            ratatui::layout::Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    ratatui::layout::Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([
            ratatui::layout::Constraint::Percentage((100 - percent_x) / 2),
            ratatui::layout::Constraint::Percentage(percent_x),
            ratatui::layout::Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
