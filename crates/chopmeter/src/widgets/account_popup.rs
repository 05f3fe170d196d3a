use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

use super::history_popup::centered_rect;
use crate::AppState;

pub struct AccountPopupWidget;

impl AccountPopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let popup_area = centered_rect(60, 60, area);

        frame.render_widget(Clear, popup_area);

        let account_text = Self::create_account_text(state);

        let popup = Paragraph::new(account_text)
            .block(
                Block::bordered()
                    .title("Account")
                    .title_alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Cyan)),
            )
            .alignment(Alignment::Left);

        frame.render_widget(popup, popup_area);
    }

    fn row(label: &'static str, value: String, color: Color) -> Line<'static> {
        Line::from(vec![
            Span::styled(label, Style::default().fg(Color::White)),
            Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ])
    }

    fn create_account_text(state: &AppState) -> Vec<Line<'static>> {
        let Some(settings) = state.settings.as_ref() else {
            return vec![Line::from(Span::styled(
                "Settings not loaded",
                Style::default().fg(Color::Red),
            ))];
        };
        let country = state.country();

        let mut account_text = vec![
            Self::row("Account: ", state.monitor.account().to_string(), Color::Yellow),
            Self::row(
                "Meter: ",
                if settings.meter_number.is_empty() {
                    "-".to_string()
                } else {
                    settings.meter_number.clone()
                },
                Color::Yellow,
            ),
            Self::row(
                "Country: ",
                format!("{} ({})", country.name(), country.currency_code()),
                Color::Cyan,
            ),
            Self::row(
                "Tariff: ",
                format!(
                    "{} per kWh{}",
                    country.format_amount(settings.tariff_rate),
                    if settings.tariff_overridden {
                        " (custom)"
                    } else {
                        " (default)"
                    }
                ),
                Color::Green,
            ),
            Self::row(
                "Last Top-up Balance: ",
                country.format_amount(settings.last_balance),
                Color::Green,
            ),
            Self::row(
                "Recorded: ",
                settings
                    .last_balance_date
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                Color::Cyan,
            ),
        ];

        account_text.extend(vec![
            Line::from(" "),
            Line::from(vec![
                Span::styled("Press ", Style::default().fg(Color::Gray)),
                Span::styled(
                    "s",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" to close", Style::default().fg(Color::Gray)),
            ]),
        ]);

        account_text
    }
}
