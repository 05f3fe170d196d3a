use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use crate::AppState;

pub struct PredictionsWidget;

impl PredictionsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let predictions_text = match state.metrics.as_ref() {
            Some(metrics) if state.is_onboarded() => {
                let burn_rate = metrics.burn_rate();
                let runway = match (metrics.days_left(), state.depletion_date()) {
                    (Some(days), Some(date)) => Span::styled(
                        format!("~{} days (around {})", days, date.format("%a %d %b")),
                        Style::default()
                            .fg(if days < 3 { Color::Red } else { Color::Green })
                            .add_modifier(Modifier::BOLD),
                    ),
                    _ => Span::styled(
                        "Not enough readings this week",
                        Style::default().fg(Color::Gray),
                    ),
                };

                vec![
                    Line::from(vec![
                        Span::styled("Estimated balance: ", Style::default().fg(Color::White)),
                        Span::styled(
                            state.format_amount(metrics.current_balance()),
                            Style::default()
                                .fg(Color::Yellow)
                                .add_modifier(Modifier::BOLD),
                        ),
                    ]),
                    Line::from(vec![
                        Span::styled("Daily burn rate: ", Style::default().fg(Color::White)),
                        Span::styled(
                            state.format_amount(burn_rate.cost_per_day()),
                            Style::default()
                                .fg(Color::Blue)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!(" ({:.1} kWh/day)", burn_rate.kwh_per_day()),
                            Style::default().fg(Color::Gray),
                        ),
                    ]),
                    Line::from(vec![
                        Span::styled("Days left: ", Style::default().fg(Color::White)),
                        runway,
                    ]),
                ]
            }
            _ => Self::render_setup_text(state),
        };

        let predictions = Paragraph::new(predictions_text)
            .block(Block::bordered().title("Runway"))
            .alignment(Alignment::Left);

        frame.render_widget(predictions, area);
    }

    fn render_setup_text(state: &AppState) -> Vec<Line<'static>> {
        let mut setup_text = vec![
            Line::from(vec![Span::styled(
                if state.data_loaded {
                    "This account is not set up yet"
                } else {
                    "Could not load meter data"
                },
                Style::default().fg(Color::Red),
            )]),
            Line::from(" "),
        ];

        if state.data_loaded {
            setup_text.push(Line::from(vec![Span::styled(
                "Run: chopmeter setup --country GH --balance <amount>",
                Style::default().fg(Color::Gray),
            )]));
            setup_text.push(Line::from(vec![Span::styled(
                "Then record readings with: chopmeter add <kWh>",
                Style::default().fg(Color::Gray),
            )]));
        }

        setup_text
    }
}
