use anyhow::Result;
use chopmeter_engine::{
    AccountSettings, CountryTariff, DashboardMetrics, Duration as UsageWindow, FileBackend,
    MeterMonitor, MeterReading,
};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    DefaultTerminal, Frame,
};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::interval;

mod commands;
mod config;
mod observability;
mod widgets;
use commands::Command;
use widgets::*;

pub const RUNWAY_HORIZON_DAYS: i64 = 30;
const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum PopupType {
    History,
    Account,
}

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    #[arg(short = 'v')]
    verbose: bool,

    /// Account to use; remembered for later runs
    #[arg(short = 'a', long = "account")]
    account: Option<String>,

    #[arg(long = "data-dir")]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

pub struct AppState {
    pub monitor: MeterMonitor,
    pub metrics: Option<DashboardMetrics>,
    pub settings: Option<AccountSettings>,
    pub recent_readings: Vec<MeterReading>,
    pub entry_count: usize,
    pub last_update: DateTime<Local>,
    pub is_loading: bool,
    pub spinner_state: usize,
    pub data_loaded: bool,
    pub error_message: Option<String>,
    pub active_popup: Option<PopupType>,
}

impl AppState {
    fn new(monitor: MeterMonitor) -> Self {
        Self {
            monitor,
            metrics: None,
            settings: None,
            recent_readings: Vec::new(),
            entry_count: 0,
            last_update: Local::now(),
            is_loading: false,
            spinner_state: 0,
            data_loaded: false,
            error_message: None,
            active_popup: None,
        }
    }

    fn refresh(&mut self) -> Result<()> {
        self.is_loading = true;
        let now = Local::now();

        let result = self.load_snapshot(now);
        match &result {
            Ok(_) => {
                self.data_loaded = true;
                self.error_message = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dashboard refresh failed");
                self.error_message = Some(e.to_string());
                self.data_loaded = false;
            }
        }

        self.is_loading = false;
        self.last_update = now;
        result
    }

    fn load_snapshot(&mut self, now: DateTime<Local>) -> Result<()> {
        self.settings = Some(self.monitor.settings()?);
        self.metrics = Some(self.monitor.dashboard(&now)?);
        self.recent_readings = self.monitor.recent_readings(
            UsageWindow::days(7),
            RECENT_LIMIT,
            now.with_timezone(&Utc),
        )?;
        self.entry_count = self.monitor.entry_count()?;
        Ok(())
    }

    fn update_spinner(&mut self) {
        self.spinner_state = (self.spinner_state + 1) % 10;
    }

    pub fn get_spinner_char(&self) -> char {
        match self.spinner_state {
            0 => '⠋',
            1 => '⠙',
            2 => '⠹',
            3 => '⠸',
            4 => '⠼',
            5 => '⠴',
            6 => '⠦',
            7 => '⠧',
            8 => '⠇',
            9 => '⠏',
            _ => '⠋',
        }
    }

    pub fn country(&self) -> &CountryTariff {
        let code = self
            .settings
            .as_ref()
            .map(|settings| settings.country_code.as_str())
            .unwrap_or_default();
        self.monitor.settings_store().tariffs().country_or_default(code)
    }

    pub fn format_amount(&self, amount: f64) -> String {
        self.country().format_amount(amount)
    }

    pub fn is_onboarded(&self) -> bool {
        self.settings
            .as_ref()
            .map(|settings| settings.onboarding_complete)
            .unwrap_or(false)
    }

    /// Share of the runway horizon still ahead, 0.0 to 1.0.
    pub fn runway_fraction(&self) -> Option<f64> {
        let days = self.metrics.as_ref()?.days_left()?;
        Some((days as f64 / RUNWAY_HORIZON_DAYS as f64).clamp(0.0, 1.0))
    }

    /// Estimated balance as a share of the last checkpoint.
    pub fn balance_fraction(&self) -> f64 {
        match (&self.metrics, &self.settings) {
            (Some(metrics), Some(settings)) if settings.last_balance > 0.0 => {
                (metrics.current_balance() / settings.last_balance).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn depletion_date(&self) -> Option<DateTime<Local>> {
        let days = self.metrics.as_ref()?.days_left()?;
        Some(self.last_update + chrono::Duration::days(days))
    }
}

pub struct App {
    state: Arc<Mutex<AppState>>,
    exit: bool,
}

impl App {
    pub fn new(monitor: MeterMonitor) -> Self {
        let mut app_state = AppState::new(monitor);

        if let Err(e) = app_state.refresh() {
            app_state.error_message = Some(format!("Initial load failed: {}", e));
        }

        Self {
            state: Arc::new(Mutex::new(app_state)),
            exit: false,
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let state_clone = Arc::clone(&self.state);

        // Other processes may add readings while the dashboard is open.
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(5));
            loop {
                interval.tick().await;

                if let Ok(mut state) = state_clone.lock() {
                    let _ = state.refresh();
                }
            }
        });

        let mut tick_interval = interval(Duration::from_millis(100));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Ok(mut state) = self.state.lock() {
                        state.update_spinner();
                    }

                    terminal.draw(|frame| self.draw(frame))?;
                }

                _ = async {
                    if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        if let Ok(event) = event::read() {
                            self.handle_event(event);
                        }
                    }
                } => {}
            }

            if self.exit {
                break;
            }
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(6),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        if let Ok(state) = self.state.lock() {
            HeaderWidget::render(frame, chunks[0], &state);
            ProgressBarsWidget::render(frame, chunks[1], &state);
            StatisticsWidget::render(frame, chunks[2], &state);
            PredictionsWidget::render(frame, chunks[3], &state);
            ShortcutsWidget::render(frame, chunks[4], &state);

            match &state.active_popup {
                Some(PopupType::History) => {
                    HistoryPopupWidget::render(frame, area, &state);
                }
                Some(PopupType::Account) => {
                    AccountPopupWidget::render(frame, area, &state);
                }
                None => {}
            }
        }
    }

    fn toggle_popup(&self, popup: PopupType) {
        if let Ok(mut state) = self.state.lock() {
            state.active_popup = if state.active_popup.as_ref() == Some(&popup) {
                None
            } else {
                Some(popup)
            };
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key_event) = event {
            if key_event.kind == KeyEventKind::Press {
                match key_event.code {
                    KeyCode::Char('q') => self.exit = true,
                    KeyCode::Char('r') => {
                        if let Ok(mut state) = self.state.lock() {
                            let _ = state.refresh();
                        }
                    }
                    KeyCode::Char('h') => self.toggle_popup(PopupType::History),
                    KeyCode::Char('s') => self.toggle_popup(PopupType::Account),
                    KeyCode::Esc => {
                        if let Ok(mut state) = self.state.lock() {
                            state.active_popup = None;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref());
    let command = args.command.unwrap_or(Command::Dashboard);

    if matches!(command, Command::Dashboard) {
        observability::init_file_tracing(args.verbose, &data_dir.join("chopmeter.log"))?;
    } else {
        observability::init_tracing(args.verbose);
    }

    let account = config::select_account(&data_dir, args.account.as_deref());
    let backend = Arc::new(FileBackend::open(&data_dir)?);
    let monitor = MeterMonitor::new(backend, &account);
    tracing::debug!(account = %account, data_dir = %data_dir.display(), "starting");

    if !matches!(command, Command::Dashboard) {
        return match commands::run(command, &monitor) {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(e) => match e.downcast_ref::<commands::Rejected>() {
                Some(rejected) => {
                    eprintln!("{}", rejected);
                    Ok(ExitCode::from(2))
                }
                None => Err(e),
            },
        };
    }

    let mut terminal = ratatui::init();
    let mut app = App::new(monitor);

    let result = app.run(&mut terminal).await;

    ratatui::restore();

    result.map(|()| ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chopmeter_engine::{CaptureCandidate, MemoryBackend};

    fn onboarded_state(balance: f64) -> AppState {
        let monitor = MeterMonitor::new(Arc::new(MemoryBackend::new()), "test");
        monitor
            .settings_store()
            .complete_onboarding("GH", "0412", balance, Utc::now() - chrono::Duration::days(1))
            .unwrap();
        AppState::new(monitor)
    }

    #[test]
    fn test_refresh_without_readings_has_no_runway() {
        let mut state = onboarded_state(40.0);
        state.refresh().unwrap();

        assert!(state.data_loaded);
        assert!(state.is_onboarded());
        assert_eq!(state.entry_count, 0);
        assert_eq!(state.runway_fraction(), None);
        assert_eq!(state.depletion_date(), None);
        assert_eq!(state.balance_fraction(), 1.0);
    }

    #[test]
    fn test_refresh_with_readings_projects_runway() {
        let mut state = onboarded_state(1000.0);
        let now = Utc::now();
        for (hours_ago, value) in [(24, "100"), (0, "110")] {
            state
                .monitor
                .record(
                    CaptureCandidate::from_manual_entry(value).unwrap(),
                    now - chrono::Duration::hours(hours_ago),
                )
                .unwrap();
        }

        state.refresh().unwrap();

        assert_eq!(state.entry_count, 2);
        assert_eq!(state.recent_readings[0].value(), 110.0);
        let fraction = state.runway_fraction().unwrap();
        assert!((0.0..=1.0).contains(&fraction));
        assert!(state.depletion_date().is_some());
        assert!(state.balance_fraction() < 1.0);
    }

    #[test]
    fn test_format_amount_uses_account_country() {
        let mut state = onboarded_state(10.0);
        state.monitor.settings_store().set_country("KE").unwrap();
        state.refresh().unwrap();

        assert_eq!(state.format_amount(3.0), "KSh 3.00");
    }
}
