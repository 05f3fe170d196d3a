use crate::backend::KeyValueBackend;
use crate::calculator::Calculator;
use crate::capture::CaptureCandidate;
use crate::data_structures::{AccountSettings, DashboardMetrics, MeterReading, SettingsPatch};
use crate::error::StoreError;
use crate::export;
use crate::settings::SettingsStore;
use crate::store::ReadingStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;

/// One account's readings, settings and metrics behind a single handle.
pub struct MeterMonitor {
    account: String,
    readings: ReadingStore,
    settings: SettingsStore,
    calculator: Calculator,
}

impl MeterMonitor {
    pub fn new(backend: Arc<dyn KeyValueBackend>, account: &str) -> Self {
        Self {
            account: account.to_string(),
            readings: ReadingStore::new(Arc::clone(&backend), account),
            settings: SettingsStore::new(backend, account),
            calculator: Calculator::new(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn record(
        &self,
        candidate: CaptureCandidate,
        now: DateTime<Utc>,
    ) -> Result<MeterReading, StoreError> {
        let reading = candidate.into_reading(now);
        self.readings.append(reading.clone())?;
        Ok(reading)
    }

    pub fn add_reading(&self, reading: MeterReading) -> Result<(), StoreError> {
        self.readings.append(reading)
    }

    pub fn remove_reading(&self, id: &str) -> Result<bool, StoreError> {
        self.readings.remove(id)
    }

    pub fn readings(&self) -> Result<Vec<MeterReading>, StoreError> {
        self.readings.all()
    }

    /// Newest readings inside `window`, at most `limit` of them.
    pub fn recent_readings(
        &self,
        window: Duration,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MeterReading>, StoreError> {
        let in_window = self.readings.in_window(window, now)?;
        Ok(self
            .calculator
            .sort_readings(&in_window)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn entry_count(&self) -> Result<usize, StoreError> {
        self.readings.len()
    }

    pub fn settings(&self) -> Result<AccountSettings, StoreError> {
        self.settings.get()
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<AccountSettings, StoreError> {
        self.settings.set(patch)
    }

    /// Recomputes metrics from the current snapshot.
    pub fn dashboard<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DashboardMetrics, StoreError> {
        let readings = self.readings.all()?;
        let settings = self.settings.get()?;
        Ok(self.calculator.compute_metrics(&readings, &settings, now))
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let readings = self.readings.all()?;
        export::write_csv(&readings, writer)
    }

    pub fn clear_data(&self) -> Result<(), StoreError> {
        self.readings.clear()?;
        self.settings.clear()
    }
}
