use crate::backend::{namespaced_key, KeyValueBackend};
use crate::data_structures::{
    AccountSettings, SettingsPatch, DEPRECATED_DEFAULT_TARIFF, SETTINGS_SCHEMA_VERSION,
};
use crate::error::StoreError;
use crate::tariffs::TariffProvider;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Explicit settings handle for one account.
pub struct SettingsStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
    tariffs: TariffProvider,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, account: &str) -> Self {
        Self {
            backend,
            key: namespaced_key(account, "settings"),
            tariffs: TariffProvider::new(),
        }
    }

    pub fn tariffs(&self) -> &TariffProvider {
        &self.tariffs
    }

    /// Loads settings, applying the pending tariff migration at most once.
    pub fn get(&self) -> Result<AccountSettings, StoreError> {
        self.update(|_| Ok(false))
    }

    /// Merges `patch`, validates the result and persists it.
    pub fn set(&self, patch: &SettingsPatch) -> Result<AccountSettings, StoreError> {
        debug!(key = %self.key, "saving settings");
        self.update(|settings| {
            patch.apply_to(settings);
            Ok(true)
        })
    }

    /// Records a freshly known balance, stamped at `now`.
    pub fn assert_balance(
        &self,
        balance: f64,
        now: DateTime<Utc>,
    ) -> Result<AccountSettings, StoreError> {
        self.set(&SettingsPatch {
            last_balance: Some(balance),
            last_balance_date: Some(now),
            ..SettingsPatch::default()
        })
    }

    /// Sets the tariff, marking it overridden when it differs from the country default.
    pub fn set_tariff(&self, rate: f64) -> Result<AccountSettings, StoreError> {
        self.update(|settings| {
            settings.tariff_rate = rate;
            settings.tariff_overridden = rate != self.tariffs.default_tariff(&settings.country_code);
            Ok(true)
        })
    }

    pub fn reset_tariff(&self) -> Result<AccountSettings, StoreError> {
        self.update(|settings| {
            settings.tariff_rate = self.tariffs.default_tariff(&settings.country_code);
            settings.tariff_overridden = false;
            Ok(true)
        })
    }

    /// Switches country. A tariff the user never overrode follows the new default.
    pub fn set_country(&self, code: &str) -> Result<AccountSettings, StoreError> {
        let country = self.tariffs.country_or_default(code);
        self.update(|settings| {
            settings.country_code = country.code().to_string();
            if !settings.tariff_overridden {
                settings.tariff_rate = country.default_tariff();
            }
            Ok(true)
        })
    }

    pub fn complete_onboarding(
        &self,
        country_code: &str,
        meter_number: &str,
        balance: f64,
        now: DateTime<Utc>,
    ) -> Result<AccountSettings, StoreError> {
        let country = self.tariffs.country_or_default(country_code);
        self.set(&SettingsPatch {
            onboarding_complete: Some(true),
            meter_number: Some(meter_number.to_string()),
            country_code: Some(country.code().to_string()),
            tariff_rate: Some(country.default_tariff()),
            tariff_overridden: Some(false),
            last_balance: Some(balance),
            last_balance_date: Some(now),
        })
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(&self.key)?;
        Ok(())
    }

    /// Loads and migrates the record, then lets `change` edit it while the backend
    /// holds its write lock. When `change` returns `Ok(true)` the result is validated
    /// and saved; a pending migration of a stored record is saved either way.
    fn update<F>(&self, change: F) -> Result<AccountSettings, StoreError>
    where
        F: FnOnce(&mut AccountSettings) -> Result<bool, StoreError>,
    {
        let mut change = Some(change);
        let mut outcome = None;

        self.backend.update(&self.key, &mut |raw| {
            let change = change.take()?;
            let (mut settings, stored) = self.parse(raw.as_deref());
            let migrated = self.migrate(&mut settings) && stored;

            let changed = match change(&mut settings).and_then(|changed| {
                if changed {
                    settings.validate()?;
                }
                Ok(changed)
            }) {
                Ok(changed) => changed,
                Err(e) => {
                    outcome = Some(Err(e));
                    return None;
                }
            };

            if !(changed || migrated) {
                outcome = Some(Ok(settings));
                return None;
            }
            match serde_json::to_string(&settings) {
                Ok(encoded) => {
                    outcome = Some(Ok(settings));
                    Some(encoded)
                }
                Err(e) => {
                    outcome = Some(Err(e.into()));
                    None
                }
            }
        })?;

        outcome.unwrap_or_else(|| {
            Err(io::Error::new(io::ErrorKind::Other, "backend skipped the update").into())
        })
    }

    /// Returns the parsed settings and whether a record was stored at all.
    fn parse(&self, raw: Option<&str>) -> (AccountSettings, bool) {
        let Some(raw) = raw else {
            return (self.fresh_defaults(), false);
        };

        match serde_json::from_str::<AccountSettings>(raw) {
            Ok(settings) => (settings, true),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored settings are corrupted, using defaults");
                (self.fresh_defaults(), false)
            }
        }
    }

    fn fresh_defaults(&self) -> AccountSettings {
        let defaults = AccountSettings::default();
        AccountSettings {
            tariff_rate: self.tariffs.default_tariff(&defaults.country_code),
            schema_version: SETTINGS_SCHEMA_VERSION,
            ..defaults
        }
    }

    fn migrate(&self, settings: &mut AccountSettings) -> bool {
        if settings.schema_version >= SETTINGS_SCHEMA_VERSION {
            return false;
        }

        if !settings.tariff_overridden && settings.tariff_rate == DEPRECATED_DEFAULT_TARIFF {
            let default = self.tariffs.default_tariff(&settings.country_code);
            info!(
                from = DEPRECATED_DEFAULT_TARIFF,
                to = default,
                "migrating deprecated default tariff"
            );
            settings.tariff_rate = default;
        }
        settings.schema_version = SETTINGS_SCHEMA_VERSION;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::ValidationError;
    use chrono::TimeZone;

    fn store_with(raw: Option<&str>) -> (Arc<MemoryBackend>, SettingsStore) {
        let backend = Arc::new(MemoryBackend::new());
        if let Some(raw) = raw {
            backend.set(&namespaced_key("home", "settings"), raw).unwrap();
        }
        let store = SettingsStore::new(backend.clone(), "home");
        (backend, store)
    }

    #[test]
    fn test_missing_settings_use_country_default() {
        let (_, store) = store_with(None);
        let settings = store.get().unwrap();
        assert_eq!(settings.tariff_rate, 2.0);
        assert!(!settings.onboarding_complete);
    }

    #[test]
    fn test_legacy_tariff_is_migrated_once() {
        let (backend, store) = store_with(Some(
            r#"{"country_code":"NG","tariff_rate":0.75,"tariff_overridden":false}"#,
        ));

        let settings = store.get().unwrap();
        assert_eq!(settings.tariff_rate, 209.5);
        assert_eq!(settings.schema_version, SETTINGS_SCHEMA_VERSION);

        // Persisted, so a deliberate later choice of 0.75 is left alone.
        let raw = backend.get(&namespaced_key("home", "settings")).unwrap().unwrap();
        assert!(raw.contains("\"schema_version\":1"));

        store
            .set(&SettingsPatch {
                tariff_rate: Some(0.75),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(store.get().unwrap().tariff_rate, 0.75);
    }

    #[test]
    fn test_overridden_legacy_tariff_is_kept() {
        let (_, store) = store_with(Some(r#"{"tariff_rate":0.75,"tariff_overridden":true}"#));
        assert_eq!(store.get().unwrap().tariff_rate, 0.75);
    }

    #[test]
    fn test_corrupted_settings_fall_back_to_defaults() {
        let (_, store) = store_with(Some("not json at all"));
        let settings = store.get().unwrap();
        assert_eq!(settings.tariff_rate, 2.0);
    }

    #[test]
    fn test_set_rejects_invalid_values_without_persisting() {
        let (_, store) = store_with(None);
        store.set_tariff(3.0).unwrap();

        let err = store
            .set(&SettingsPatch {
                tariff_rate: Some(-2.0),
                ..SettingsPatch::default()
            })
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::InvalidTariff(-2.0)));

        let err = store
            .set(&SettingsPatch {
                last_balance: Some(-1.0),
                ..SettingsPatch::default()
            })
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::InvalidBalance(-1.0)));

        assert_eq!(store.get().unwrap().tariff_rate, 3.0);
    }

    #[test]
    fn test_set_tariff_tracks_override_flag() {
        let (_, store) = store_with(None);

        assert!(store.set_tariff(2.5).unwrap().tariff_overridden);
        assert!(!store.set_tariff(2.0).unwrap().tariff_overridden);

        store.set_tariff(4.0).unwrap();
        let reset = store.reset_tariff().unwrap();
        assert_eq!(reset.tariff_rate, 2.0);
        assert!(!reset.tariff_overridden);
    }

    #[test]
    fn test_set_country_respects_override() {
        let (_, store) = store_with(None);

        let settings = store.set_country("ZA").unwrap();
        assert_eq!(settings.tariff_rate, 3.5);

        store.set_tariff(5.0).unwrap();
        let settings = store.set_country("KE").unwrap();
        assert_eq!(settings.country_code, "KE");
        assert_eq!(settings.tariff_rate, 5.0);
    }

    #[test]
    fn test_web_app_override_survives_migration() {
        let (_, store) = store_with(Some(
            r#"{"countryCode":"NG","tariffRate":0.75,"tariffOverridden":true,"lastBalance":20}"#,
        ));

        let settings = store.get().unwrap();
        assert_eq!(settings.country_code, "NG");
        assert_eq!(settings.tariff_rate, 0.75);
        assert_eq!(settings.last_balance, 20.0);
    }

    #[test]
    fn test_handles_on_one_account_see_each_others_changes() {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
        let first = SettingsStore::new(Arc::clone(&backend), "home");
        let second = SettingsStore::new(Arc::clone(&backend), "home");

        second.set_country("NG").unwrap();
        let settings = first.set_tariff(209.5).unwrap();

        assert_eq!(settings.country_code, "NG");
        assert!(!settings.tariff_overridden);

        second.set_tariff(100.0).unwrap();
        let settings = first.set_country("ZA").unwrap();
        assert_eq!(settings.tariff_rate, 100.0);
    }

    #[test]
    fn test_concurrent_country_switches_keep_tariff_consistent() {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
        let codes = ["GH", "NG", "ZA", "KE"];

        let handles: Vec<_> = codes
            .into_iter()
            .map(|code| {
                let store = SettingsStore::new(Arc::clone(&backend), "home");
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.set_country(code).unwrap();
                        store.reset_tariff().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = SettingsStore::new(backend, "home");
        let settings = store.get().unwrap();
        assert!(!settings.tariff_overridden);
        assert_eq!(
            settings.tariff_rate,
            store.tariffs().default_tariff(&settings.country_code)
        );
    }

    #[test]
    fn test_assert_balance_is_monotonic_in_date() {
        let (_, store) = store_with(None);
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();

        store.assert_balance(100.0, t1).unwrap();
        let settings = store.assert_balance(80.0, t0).unwrap();

        assert_eq!(settings.last_balance, 80.0);
        assert_eq!(settings.last_balance_date, t1);
    }

    #[test]
    fn test_complete_onboarding() {
        let (_, store) = store_with(None);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let settings = store.complete_onboarding("us", "04123", 25.0, now).unwrap();
        assert!(settings.onboarding_complete);
        assert_eq!(settings.country_code, "US");
        assert_eq!(settings.tariff_rate, 0.1778);
        assert_eq!(settings.last_balance_date, now);

        store.clear().unwrap();
        assert!(!store.get().unwrap().onboarding_complete);
    }
}
