use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};

use crate::AppState;

pub struct HeaderWidget;

impl HeaderWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let spinner = if state.is_loading {
            state.get_spinner_char().to_string()
        } else {
            " ".to_string()
        };

        let meter = state
            .settings
            .as_ref()
            .map(|settings| settings.meter_number.as_str())
            .filter(|number| !number.is_empty())
            .map(|number| format!(" - meter {}", number))
            .unwrap_or_default();

        let title = format!("ChopMeter [{}]{}", state.monitor.account(), meter);
        let header_text = vec![Line::from(vec![
            Span::styled(
                title,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(spinner, Style::default().fg(Color::Yellow)),
        ])];

        let header = Paragraph::new(header_text)
            .block(Block::bordered().title(state.country().name()))
            .alignment(Alignment::Center);

        frame.render_widget(header, area);
    }
}
