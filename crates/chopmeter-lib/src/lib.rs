pub mod backend;
pub mod calculator;
pub mod capture;
pub mod data_structures;
pub mod error;
pub mod export;
pub mod monitor;
pub mod settings;
pub mod store;
pub mod tariffs;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use calculator::Calculator;
pub use capture::CaptureCandidate;
pub use data_structures::{
    AccountSettings, BurnRate, DashboardMetrics, MeterReading, ReadingSource, SettingsPatch,
};
pub use error::{StoreError, ValidationError};
pub use monitor::MeterMonitor;
pub use settings::SettingsStore;
pub use store::ReadingStore;
pub use tariffs::{CountryTariff, TariffProvider};

pub use chrono::{DateTime, Duration, Utc};

pub mod prelude {
    pub use crate::capture::CaptureCandidate;
    pub use crate::data_structures::{DashboardMetrics, MeterReading, ReadingSource};
    pub use crate::error::{StoreError, ValidationError};
    pub use crate::monitor::MeterMonitor;
    pub use anyhow::Result;
    pub use chrono::{DateTime, Utc};
}
