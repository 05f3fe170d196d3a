use crate::data_structures::MeterReading;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 4] = ["ID", "Value (kWh)", "Timestamp", "Source"];

/// Writes readings as CSV, in the order given.
pub fn write_csv<W: Write>(readings: &[MeterReading], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(CSV_HEADER)
        .context("Failed to write CSV header")?;

    for reading in readings {
        csv_writer
            .write_record([
                reading.id().to_string(),
                reading.value().to_string(),
                reading
                    .timestamp()
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                reading.source().as_str().to_string(),
            ])
            .with_context(|| format!("Failed to write reading {}", reading.id()))?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "chopmeter-readings-{}.csv",
        now.with_timezone(&Utc).format("%Y-%m-%d")
    )
}

pub fn export_to_file<P: AsRef<Path>>(readings: &[MeterReading], path: P) -> Result<()> {
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file: {}", path.as_ref().display()))?;
    write_csv(readings, file)
}
