use chopmeter_engine::prelude::*;
use chopmeter_engine::{Duration, FileBackend, MemoryBackend};
use std::env;
use std::sync::Arc;

fn runway_bar(days_left: i64, horizon: i64) -> String {
    let bar_length = 20;
    let filled = ((days_left.clamp(0, horizon) as f64 / horizon as f64) * bar_length as f64) as usize;
    "█".repeat(filled) + &"░".repeat(bar_length - filled)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Persist under the given directory, or keep everything in memory for a dry run.
    let monitor = if args.len() >= 2 {
        println!("Using data directory: {}", args[1]);
        MeterMonitor::new(Arc::new(FileBackend::open(&args[1])?), "demo")
    } else {
        println!("No data directory given, using an in-memory store");
        MeterMonitor::new(Arc::new(MemoryBackend::new()), "demo")
    };

    let now = Utc::now();
    let start = now - Duration::days(4);

    if !monitor.settings()?.onboarding_complete {
        monitor
            .settings_store()
            .complete_onboarding("GH", "demo-meter", 120.0, start)?;
    }

    if monitor.entry_count()? == 0 {
        let samples = [
            ("1520.4", 0),
            ("1531.9", 1),
            ("1540.2", 2),
            ("1552.0", 3),
        ];
        for (text, day) in samples {
            let candidate = CaptureCandidate::from_manual_entry(text)?;
            monitor.record(candidate, start + Duration::days(day))?;
        }

        if let Some(scanned) = CaptureCandidate::from_recognized_text("kWh\n01561.3\n", 82.0) {
            println!(
                "Scanned {:.1} kWh (confidence {:.0}%)",
                scanned.value(),
                scanned.confidence().unwrap_or(0.0)
            );
            monitor.record(scanned, now)?;
        }
    }

    let settings = monitor.settings()?;
    let country = monitor.settings_store().tariffs().country_or_default(&settings.country_code);
    let metrics = monitor.dashboard(&chrono::Local::now())?;

    println!("\n--- Account ---");
    println!("Meter: {}", settings.meter_number);
    println!("Tariff: {} per kWh", country.format_amount(settings.tariff_rate));
    println!(
        "Last balance: {} at {}",
        country.format_amount(settings.last_balance),
        settings.last_balance_date.format("%Y-%m-%d %H:%M UTC")
    );

    println!("\n--- Dashboard ---");
    println!("Estimated balance: {}", country.format_amount(metrics.current_balance()));
    println!(
        "Burn rate: {:.2} kWh/day, {} per day",
        metrics.burn_rate().kwh_per_day(),
        country.format_amount(metrics.daily_burn_rate())
    );
    println!("Today: {:.1} kWh", metrics.today_usage());
    println!("This week: {:.1} kWh", metrics.weekly_usage());

    match metrics.days_left() {
        Some(days) => {
            println!("Runway: ~{} days [{}]", days, runway_bar(days, 30));
            println!(
                "Runs out around: {}",
                (now + Duration::days(days)).format("%Y-%m-%d")
            );
        }
        None => println!("Runway: not enough readings this week"),
    }

    println!("\n--- Recent Readings ---");
    for reading in monitor.recent_readings(Duration::days(7), 5, now)? {
        println!(
            "{}  {:>8.1} kWh  {}",
            reading.timestamp().format("%a %d %b %H:%M"),
            reading.value(),
            reading.source().label()
        );
    }

    Ok(())
}
