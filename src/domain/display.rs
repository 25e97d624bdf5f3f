// Display points derived from wire records at the moment of receipt
use crate::domain::reading::Reading;
use crate::domain::series::SamePayload;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// Aggregate record served on the pull channel. Carries no id or timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSample {
    pub avg_temp: f64,
    pub avg_hum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPoint {
    pub time: String,
    pub temp: f64,
    pub humidity: f64,
}

impl RawPoint {
    pub fn from_reading(reading: &Reading, time: String) -> Result<Self, SyncError> {
        Ok(Self {
            time,
            temp: reading.temperature_value()?,
            humidity: reading.humidity_value()?,
        })
    }
}

impl SamePayload for RawPoint {
    fn same_payload(&self, other: &Self) -> bool {
        self.temp == other.temp && self.humidity == other.humidity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidingPoint {
    pub time: String,
    pub avg_temp: f64,
    pub avg_humidity: f64,
}

impl SlidingPoint {
    pub fn from_sample(sample: &AggregateSample, time: String) -> Self {
        Self {
            time,
            avg_temp: sample.avg_temp,
            avg_humidity: sample.avg_hum,
        }
    }
}

impl SamePayload for SlidingPoint {
    fn same_payload(&self, other: &Self) -> bool {
        self.avg_temp == other.avg_temp && self.avg_humidity == other.avg_humidity
    }
}

/// Local wall-clock time of receipt, e.g. `14:03:27`.
pub fn receipt_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
