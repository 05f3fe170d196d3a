use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEPRECATED_DEFAULT_TARIFF: f64 = 0.75;
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    #[serde(alias = "ocr")]
    Optical,
    Manual,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Optical => "optical",
            ReadingSource::Manual => "manual",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadingSource::Optical => "Scanned",
            ReadingSource::Manual => "Manual entry",
        }
    }
}

impl std::str::FromStr for ReadingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optical" | "ocr" => Ok(ReadingSource::Optical),
            "manual" => Ok(ReadingSource::Manual),
            other => Err(format!("unknown reading source '{}'", other)),
        }
    }
}

/// A single capture of the meter's cumulative kWh counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    id: String,
    value: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    source: ReadingSource,
}

impl MeterReading {
    pub fn new(id: String, value: f64, timestamp: DateTime<Utc>, source: ReadingSource) -> Self {
        Self {
            id,
            value,
            timestamp,
            source,
        }
    }

    /// Builds a reading with a fresh identifier.
    pub fn with_generated_id(value: f64, timestamp: DateTime<Utc>, source: ReadingSource) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), value, timestamp, source)
    }

    /// Builds a reading from a millisecond epoch, rejecting values chrono cannot represent.
    pub fn from_millis(
        id: String,
        value: f64,
        timestamp_ms: i64,
        source: ReadingSource,
    ) -> Result<Self, ValidationError> {
        let timestamp = DateTime::from_timestamp_millis(timestamp_ms)
            .ok_or(ValidationError::InvalidTimestamp(timestamp_ms))?;
        let reading = Self::new(id, value, timestamp, source);
        reading.validate()?;
        Ok(reading)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.value.is_finite() {
            return Err(ValidationError::NonFiniteValue);
        }
        if self.value < 0.0 {
            return Err(ValidationError::NegativeValue(self.value));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn source(&self) -> ReadingSource {
        self.source
    }
}

/// Per-account settings the engine reads. Persisted as a flat JSON record.
///
/// Records saved by the web app use camelCase keys; those are accepted on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    #[serde(alias = "onboardingComplete")]
    pub onboarding_complete: bool,
    #[serde(alias = "meterNumber")]
    pub meter_number: String,
    #[serde(alias = "countryCode")]
    pub country_code: String,
    #[serde(alias = "tariffRate")]
    pub tariff_rate: f64,
    #[serde(alias = "tariffOverridden")]
    pub tariff_overridden: bool,
    #[serde(alias = "lastBalance")]
    pub last_balance: f64,
    #[serde(alias = "lastBalanceDate", with = "chrono::serde::ts_milliseconds")]
    pub last_balance_date: DateTime<Utc>,
    pub schema_version: u32,
}

impl AccountSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.tariff_rate.is_finite() || self.tariff_rate <= 0.0 {
            return Err(ValidationError::InvalidTariff(self.tariff_rate));
        }
        if !self.last_balance.is_finite() || self.last_balance < 0.0 {
            return Err(ValidationError::InvalidBalance(self.last_balance));
        }
        Ok(())
    }
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            onboarding_complete: false,
            meter_number: String::new(),
            country_code: "GH".to_string(),
            tariff_rate: DEPRECATED_DEFAULT_TARIFF,
            tariff_overridden: false,
            last_balance: 0.0,
            last_balance_date: DateTime::<Utc>::UNIX_EPOCH,
            schema_version: 0,
        }
    }
}

/// Partial update applied by `SettingsStore::set`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub onboarding_complete: Option<bool>,
    pub meter_number: Option<String>,
    pub country_code: Option<String>,
    pub tariff_rate: Option<f64>,
    pub tariff_overridden: Option<bool>,
    pub last_balance: Option<f64>,
    pub last_balance_date: Option<DateTime<Utc>>,
}

impl SettingsPatch {
    pub fn apply_to(&self, settings: &mut AccountSettings) {
        if let Some(done) = self.onboarding_complete {
            settings.onboarding_complete = done;
        }
        if let Some(ref meter_number) = self.meter_number {
            settings.meter_number = meter_number.clone();
        }
        if let Some(ref code) = self.country_code {
            settings.country_code = code.clone();
        }
        if let Some(rate) = self.tariff_rate {
            settings.tariff_rate = rate;
        }
        if let Some(overridden) = self.tariff_overridden {
            settings.tariff_overridden = overridden;
        }
        if let Some(balance) = self.last_balance {
            settings.last_balance = balance;
        }
        // The checkpoint date only moves forward.
        if let Some(date) = self.last_balance_date {
            settings.last_balance_date = settings.last_balance_date.max(date);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnRate {
    kwh_per_day: f64,
    cost_per_day: f64,
}

impl BurnRate {
    pub fn new(kwh_per_day: f64, cost_per_day: f64) -> Self {
        Self {
            kwh_per_day,
            cost_per_day,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn kwh_per_day(&self) -> f64 {
        self.kwh_per_day
    }

    pub fn cost_per_day(&self) -> f64 {
        self.cost_per_day
    }
}

/// Snapshot of the account derived from readings, settings and the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardMetrics {
    current_balance: f64,
    burn_rate: BurnRate,
    days_left: Option<i64>,
    today_usage: f64,
    weekly_usage: f64,
    last_reading: Option<MeterReading>,
}

impl DashboardMetrics {
    pub fn new(
        current_balance: f64,
        burn_rate: BurnRate,
        days_left: Option<i64>,
        today_usage: f64,
        weekly_usage: f64,
        last_reading: Option<MeterReading>,
    ) -> Self {
        Self {
            current_balance,
            burn_rate,
            days_left,
            today_usage,
            weekly_usage,
            last_reading,
        }
    }

    pub fn current_balance(&self) -> f64 {
        self.current_balance
    }

    pub fn burn_rate(&self) -> BurnRate {
        self.burn_rate
    }

    pub fn daily_burn_rate(&self) -> f64 {
        self.burn_rate.cost_per_day()
    }

    /// Projected whole days of runway; `None` when the burn rate is zero or unknown.
    pub fn days_left(&self) -> Option<i64> {
        self.days_left
    }

    pub fn today_usage(&self) -> f64 {
        self.today_usage
    }

    pub fn weekly_usage(&self) -> f64 {
        self.weekly_usage
    }

    pub fn last_reading(&self) -> Option<&MeterReading> {
        self.last_reading.as_ref()
    }

    pub fn has_sufficient_data(&self) -> bool {
        self.days_left.is_some()
    }
}
