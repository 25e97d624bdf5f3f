// Reading domain model - the record carried on the push channel
use crate::error::SyncError;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Temperature range in hundredths of a degree, upper bound exclusive.
pub const TEMPERATURE_CENTI: Range<u32> = 2000..3000;
/// Humidity range in hundredths of a percent, upper bound exclusive.
pub const HUMIDITY_CENTI: Range<u32> = 3000..5000;

/// One synthetic sensor reading. `id` is scoped to a single connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: u64,
    pub timestamp: String,
    pub temperature: String,
    pub humidity: String,
}

impl Reading {
    /// Draw a reading with two-decimal values from the configured ranges.
    ///
    /// Values are drawn as integer hundredths so that rounding can never
    /// push a value onto the exclusive upper bound.
    pub fn synthesize<R: Rng + ?Sized>(id: u64, now: DateTime<Utc>, rng: &mut R) -> Self {
        Self {
            id,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            temperature: format_centi(rng.gen_range(TEMPERATURE_CENTI)),
            humidity: format_centi(rng.gen_range(HUMIDITY_CENTI)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn temperature_value(&self) -> Result<f64, SyncError> {
        parse_decimal("temperature", &self.temperature)
    }

    pub fn humidity_value(&self) -> Result<f64, SyncError> {
        parse_decimal("humidity", &self.humidity)
    }
}

fn format_centi(value: u32) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

fn parse_decimal(field: &str, raw: &str) -> Result<f64, SyncError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SyncError::Parse(format!("{} is not a decimal: {:?}", field, raw)))?;
    if !value.is_finite() {
        return Err(SyncError::Parse(format!("{} is not finite: {:?}", field, raw)));
    }
    Ok(value)
}
