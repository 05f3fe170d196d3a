use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Gauge},
    Frame,
};

use crate::{AppState, RUNWAY_HORIZON_DAYS};

pub struct ProgressBarsWidget;

impl ProgressBarsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let balance_fraction = state.balance_fraction();
        let current_balance = state
            .metrics
            .as_ref()
            .map(|metrics| metrics.current_balance())
            .unwrap_or(0.0);
        let balance_gauge = Gauge::default()
            .block(Block::bordered().title("Balance vs last top-up"))
            .gauge_style(gauge_color(balance_fraction))
            .ratio(balance_fraction)
            .label(state.format_amount(current_balance));

        frame.render_widget(balance_gauge, chunks[0]);

        let title = format!("Runway ({} day scale)", RUNWAY_HORIZON_DAYS);
        let runway_gauge = match state.runway_fraction() {
            Some(fraction) => {
                let days = state
                    .metrics
                    .as_ref()
                    .and_then(|metrics| metrics.days_left())
                    .unwrap_or(0);
                Gauge::default()
                    .block(Block::bordered().title(title))
                    .gauge_style(gauge_color(fraction))
                    .ratio(fraction)
                    .label(format!("~{} days", days))
            }
            None => Gauge::default()
                .block(Block::bordered().title(title))
                .gauge_style(Style::default().fg(Color::DarkGray))
                .ratio(0.0)
                .label("need 2 readings this week"),
        };

        frame.render_widget(runway_gauge, chunks[1]);
    }
}

fn gauge_color(fraction: f64) -> Style {
    if fraction < 0.2 {
        Style::default().fg(Color::Red)
    } else if fraction < 0.4 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    }
}
