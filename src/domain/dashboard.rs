// Dashboard domain model - what a renderer reads from the buffer
use super::display::{RawPoint, SlidingPoint};
use serde::Serialize;

/// Point-in-time copy of both series, oldest point first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub raw: Vec<RawPoint>,
    pub sliding: Vec<SlidingPoint>,
}

impl DashboardSnapshot {
    pub fn latest_raw(&self) -> Option<&RawPoint> {
        self.raw.last()
    }

    pub fn latest_sliding(&self) -> Option<&SlidingPoint> {
        self.sliding.last()
    }

    /// The four headline tiles: current readings and current averages.
    pub fn tiles(&self) -> Vec<Tile> {
        let raw = self.latest_raw();
        let sliding = self.latest_sliding();
        vec![
            Tile::new("Current Temperature", "°C", raw.map(|p| p.temp)),
            Tile::new("Current Humidity", "%", raw.map(|p| p.humidity)),
            Tile::new("Avg Temperature", "°C", sliding.map(|p| p.avg_temp)),
            Tile::new("Avg Humidity", "%", sliding.map(|p| p.avg_humidity)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tile {
    pub title: &'static str,
    pub unit: &'static str,
    pub value: Option<f64>,
}

impl Tile {
    pub fn new(title: &'static str, unit: &'static str, value: Option<f64>) -> Self {
        Self { title, unit, value }
    }

    /// `21.50°C`, or `--°C` when the series is still empty.
    pub fn display_value(&self) -> String {
        match self.value {
            Some(v) => format!("{:.2}{}", v, self.unit),
            None => format!("--{}", self.unit),
        }
    }
}
