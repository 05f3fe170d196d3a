use crate::backend::{namespaced_key, KeyValueBackend};
use crate::data_structures::MeterReading;
use crate::error::{StoreError, ValidationError};
use chrono::{DateTime, Duration, Utc};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered custody of one account's readings on top of a key-value backend.
///
/// Writes go through `KeyValueBackend::update`, so any number of stores opened on
/// the same backend and account see each other's appends.
pub struct ReadingStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl ReadingStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, account: &str) -> Self {
        Self {
            backend,
            key: namespaced_key(account, "readings"),
        }
    }

    /// Appends a validated reading. Ids are unique within the account.
    pub fn append(&self, reading: MeterReading) -> Result<(), StoreError> {
        reading.validate()?;

        self.modify(|readings| {
            if readings.iter().any(|existing| existing.id() == reading.id()) {
                return Err(ValidationError::DuplicateId(reading.id().to_string()).into());
            }
            debug!(id = reading.id(), value = reading.value(), "appending reading");
            readings.push(reading);
            Ok(true)
        })?;
        Ok(())
    }

    /// Returns an owned snapshot; later writes do not affect it.
    pub fn all(&self) -> Result<Vec<MeterReading>, StoreError> {
        Ok(self.parse(self.backend.get(&self.key)?.as_deref()))
    }

    /// Readings at or after `now - duration_back`. A window reaching past the
    /// representable range covers everything.
    pub fn in_window(
        &self,
        duration_back: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<MeterReading>, StoreError> {
        let cutoff = now.checked_sub_signed(duration_back).unwrap_or(
            if duration_back < Duration::zero() {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            },
        );
        Ok(self
            .all()?
            .into_iter()
            .filter(|reading| reading.timestamp() >= cutoff)
            .collect())
    }

    /// Deletes by id. Returns whether anything was removed; a missing id is not an error.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.modify(|readings| {
            let before = readings.len();
            readings.retain(|reading| reading.id() != id);
            Ok(readings.len() != before)
        })?;

        if removed {
            debug!(id, "removed reading");
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(&self.key)?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Applies `change` to the stored list under the backend's write lock.
    /// The list is written back only when `change` returns `Ok(true)`.
    fn modify<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<MeterReading>) -> Result<bool, StoreError>,
    {
        let mut change = Some(change);
        let mut outcome = None;

        self.backend.update(&self.key, &mut |raw| {
            let change = change.take()?;
            let mut readings = self.parse(raw.as_deref());
            match change(&mut readings) {
                Ok(true) => match serde_json::to_string(&readings) {
                    Ok(encoded) => {
                        outcome = Some(Ok(true));
                        Some(encoded)
                    }
                    Err(e) => {
                        outcome = Some(Err(e.into()));
                        None
                    }
                },
                result => {
                    outcome = Some(result);
                    None
                }
            }
        })?;

        outcome.unwrap_or_else(|| {
            Err(io::Error::new(io::ErrorKind::Other, "backend skipped the update").into())
        })
    }

    fn parse(&self, raw: Option<&str>) -> Vec<MeterReading> {
        let Some(raw) = raw else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<MeterReading>>(raw) {
            Ok(readings) => readings,
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored readings are corrupted, starting empty");
                Vec::new()
            }
        }
    }
}
