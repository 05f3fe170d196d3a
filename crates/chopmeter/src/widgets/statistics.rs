use chrono::Local;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use crate::AppState;

pub struct StatisticsWidget;

impl StatisticsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let metrics = state.metrics.as_ref();

        let mut stats_text = vec![
            Line::from(vec![
                Span::styled("Data Status: ", Style::default().fg(Color::White)),
                Span::styled(
                    if state.data_loaded {
                        format!("Loaded ({} readings)", state.entry_count)
                    } else if state.is_loading {
                        "Loading...".to_string()
                    } else {
                        "No data".to_string()
                    },
                    Style::default()
                        .fg(if state.data_loaded {
                            Color::Green
                        } else {
                            Color::Red
                        })
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Last Reading: ", Style::default().fg(Color::White)),
                Span::styled(
                    match metrics.and_then(|m| m.last_reading()) {
                        Some(reading) => format!(
                            "{:.1} kWh, {}",
                            reading.value(),
                            reading
                                .timestamp()
                                .with_timezone(&Local)
                                .format("%a %d %b %H:%M")
                        ),
                        None => "none yet".to_string(),
                    },
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Usage: ", Style::default().fg(Color::White)),
                Span::styled(
                    format!(
                        "{:.1} kWh today",
                        metrics.map(|m| m.today_usage()).unwrap_or(0.0)
                    ),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(
                        " / {:.1} kWh this week",
                        metrics.map(|m| m.weekly_usage()).unwrap_or(0.0)
                    ),
                    Style::default().fg(Color::Gray),
                ),
            ]),
        ];

        if let Some(error) = &state.error_message {
            stats_text.push(Line::from(vec![
                Span::styled("Error: ", Style::default().fg(Color::Red)),
                Span::styled(
                    error.chars().take(50).collect::<String>()
                        + if error.len() > 50 { "..." } else { "" },
                    Style::default().fg(Color::Red),
                ),
            ]));
        } else {
            stats_text.push(Line::from(vec![
                Span::styled("Last Update: ", Style::default().fg(Color::White)),
                Span::styled(
                    state.last_update.format("%H:%M:%S").to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
        }

        let stats = Paragraph::new(stats_text)
            .block(Block::bordered().title("Statistics"))
            .alignment(Alignment::Left);

        frame.render_widget(stats, area);
    }
}
