use anyhow::{bail, Result};
use chopmeter_engine::export;
use chopmeter_engine::prelude::*;
use chopmeter_engine::{CountryTariff, Duration, StoreError};
use chrono::Local;
use clap::Subcommand;
use std::path::PathBuf;
use thiserror::Error;

/// Input the user can correct. `main` prints it without context and exits with status 2.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct Rejected(pub String);

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Live terminal dashboard (default)
    Dashboard,
    /// Print the current metrics once
    Status,
    /// Record a manually read meter value
    Add { value: String },
    /// Record a value from recognized display text
    Scan {
        text: String,
        #[arg(short, long, default_value_t = 0.0)]
        confidence: f32,
    },
    /// Delete a reading by id
    Remove { id: String },
    /// List recent readings, newest first
    List {
        #[arg(short, long, default_value_t = 7)]
        days: i64,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Write all readings as CSV
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// First-time account setup
    Setup {
        #[arg(short, long, default_value = "GH")]
        country: String,
        #[arg(short, long, default_value = "")]
        meter: String,
        #[arg(short, long)]
        balance: f64,
    },
    /// Record the balance shown on the meter right now
    Balance { amount: f64 },
    /// Set the tariff per kWh, or go back to the country default
    Tariff {
        rate: Option<f64>,
        #[arg(long, conflicts_with = "rate")]
        reset: bool,
    },
    /// Switch country
    Country { code: String },
    /// List supported countries and their default tariffs
    Countries,
    /// Delete every reading and setting of the account
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn country_for(monitor: &MeterMonitor, code: &str) -> CountryTariff {
    monitor
        .settings_store()
        .tariffs()
        .country_or_default(code)
        .clone()
}

/// Separates rejected input from storage failures.
fn report(result: std::result::Result<(), StoreError>) -> Result<()> {
    match result {
        Err(StoreError::Validation(e)) => Err(Rejected(e.to_string()).into()),
        other => Ok(other?),
    }
}

pub fn run(command: Command, monitor: &MeterMonitor) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Dashboard => bail!("the dashboard is started from main"),
        Command::Status => print_status(monitor),
        Command::Add { value } => report(
            CaptureCandidate::from_manual_entry(&value)
                .map_err(StoreError::from)
                .and_then(|candidate| monitor.record(candidate, now))
                .map(|reading| println!("Saved {:.1} kWh ({})", reading.value(), reading.id())),
        ),
        Command::Scan { text, confidence } => {
            let Some(candidate) = CaptureCandidate::from_recognized_text(&text, confidence) else {
                bail!(Rejected(
                    "Could not read meter. Try again or enter manually.".to_string()
                ));
            };
            let reading = monitor.record(candidate, now)?;
            println!(
                "Saved {:.1} kWh from scan, confidence {:.0}% ({})",
                reading.value(),
                confidence,
                reading.id()
            );
            Ok(())
        }
        Command::Remove { id } => {
            if monitor.remove_reading(&id)? {
                println!("Removed {}", id);
            } else {
                println!("No reading with id {}", id);
            }
            Ok(())
        }
        Command::List { days, limit } => {
            let window = Duration::try_days(days)
                .ok_or_else(|| Rejected(format!("--days {} is out of range", days)))?;
            let readings = monitor.recent_readings(window, limit, now)?;
            if readings.is_empty() {
                println!("No readings in the last {} days", days);
            }
            for reading in readings {
                println!(
                    "{}  {:>10.1} kWh  {:<12}  {}",
                    reading.timestamp().with_timezone(&Local).format("%a %d %b %H:%M"),
                    reading.value(),
                    reading.source().label(),
                    reading.id()
                );
            }
            Ok(())
        }
        Command::Export { output } => {
            if monitor.entry_count()? == 0 {
                println!("No readings to export");
                return Ok(());
            }
            match output {
                Some(path) if path.is_dir() => {
                    let path = path.join(export::export_file_name(&Local::now()));
                    export::export_to_file(&monitor.readings()?, &path)?;
                    println!("CSV exported to {}", path.display());
                }
                Some(path) => {
                    export::export_to_file(&monitor.readings()?, &path)?;
                    println!("CSV exported to {}", path.display());
                }
                None => monitor.export_csv(std::io::stdout().lock())?,
            }
            Ok(())
        }
        Command::Setup {
            country,
            meter,
            balance,
        } => report(
            monitor
                .settings_store()
                .complete_onboarding(&country, &meter, balance, now)
                .map(|settings| {
                    let country = country_for(monitor, &settings.country_code);
                    println!(
                        "Account ready: {} tariff {} per kWh, balance {}",
                        country.name(),
                        country.format_amount(settings.tariff_rate),
                        country.format_amount(settings.last_balance)
                    );
                }),
        ),
        Command::Balance { amount } => report(
            monitor
                .settings_store()
                .assert_balance(amount, now)
                .map(|settings| println!("Balance checkpoint set to {:.2}", settings.last_balance)),
        ),
        Command::Tariff { rate, reset } => {
            let result = match (rate, reset) {
                (_, true) => monitor.settings_store().reset_tariff(),
                (Some(rate), false) => monitor.settings_store().set_tariff(rate),
                (None, false) => monitor.settings(),
            };
            report(result.map(|settings| {
                println!(
                    "Tariff: {:.4} per kWh{}",
                    settings.tariff_rate,
                    if settings.tariff_overridden { " (custom)" } else { " (country default)" }
                )
            }))
        }
        Command::Country { code } => report(monitor.settings_store().set_country(&code).map(
            |settings| {
                let country = country_for(monitor, &settings.country_code);
                println!(
                    "Country set to {}, tariff {:.4} per kWh",
                    country.name(),
                    settings.tariff_rate
                );
            },
        )),
        Command::Countries => {
            for country in monitor.settings_store().tariffs().supported_countries() {
                println!(
                    "{}  {:<16} {} {:>8.4} per kWh",
                    country.code(),
                    country.name(),
                    country.currency_code(),
                    country.default_tariff()
                );
            }
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete account '{}' without --yes", monitor.account());
            }
            monitor.clear_data()?;
            println!("Cleared all data for account '{}'", monitor.account());
            Ok(())
        }
    }
}

fn print_status(monitor: &MeterMonitor) -> Result<()> {
    let settings = monitor.settings()?;
    if !settings.onboarding_complete {
        println!("Account '{}' is not set up yet. Run `chopmeter setup --balance <amount>`.", monitor.account());
        return Ok(());
    }

    let country = country_for(monitor, &settings.country_code);
    let metrics = monitor.dashboard(&Local::now())?;

    println!("Estimated balance: {}", country.format_amount(metrics.current_balance()));
    println!("Daily burn rate:   {}", country.format_amount(metrics.daily_burn_rate()));
    match metrics.days_left() {
        Some(days) => println!("Days left:         ~{}", days),
        None => println!("Days left:         not enough readings this week"),
    }
    println!("Today:             {:.1} kWh", metrics.today_usage());
    println!("This week:         {:.1} kWh", metrics.weekly_usage());
    if let Some(reading) = metrics.last_reading() {
        println!(
            "Last reading:      {:.1} kWh at {}",
            reading.value(),
            reading.timestamp().with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
