use crate::data_structures::{MeterReading, ReadingSource};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn numeric_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.?\d*").expect("static pattern compiles"))
}

/// A value offered by the capture pipeline before it becomes a stored reading.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCandidate {
    value: f64,
    source: ReadingSource,
    confidence: Option<f32>,
}

impl CaptureCandidate {
    /// Extracts the meter value from recognized display text.
    ///
    /// The longest numeric run wins, since LCD captures often pick up stray digits
    /// around the counter. Returns `None` when nothing positive can be read.
    pub fn from_recognized_text(raw_text: &str, confidence: f32) -> Option<Self> {
        let longest = numeric_runs()
            .find_iter(raw_text.trim())
            .map(|m| m.as_str())
            .fold(None::<&str>, |best, run| match best {
                Some(current) if current.len() >= run.len() => Some(current),
                _ => Some(run),
            })?;

        let value: f64 = longest.parse().ok()?;
        if !value.is_finite() || value <= 0.0 {
            return None;
        }

        Some(Self {
            value,
            source: ReadingSource::Optical,
            confidence: Some(confidence),
        })
    }

    pub fn from_manual_entry(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(Self {
                value,
                source: ReadingSource::Manual,
                confidence: None,
            }),
            _ => Err(ValidationError::InvalidManualEntry(trimmed.to_string())),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn source(&self) -> ReadingSource {
        self.source
    }

    /// Recognition confidence, only meaningful for display.
    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn into_reading(self, now: DateTime<Utc>) -> MeterReading {
        MeterReading::with_generated_id(self.value, now, self.source)
    }
}
