// Sliding-window averages over the most recent readings
use super::display::AggregateSample;
use std::collections::VecDeque;

/// Readings kept by the aggregator.
pub const AGGREGATE_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    temperatures: VecDeque<f64>,
    humidities: VecDeque<f64>,
    size: usize,
}

impl SlidingWindow {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            temperatures: VecDeque::with_capacity(size),
            humidities: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Push one reading and return the averages over the current window.
    pub fn push(&mut self, temperature: f64, humidity: f64) -> AggregateSample {
        if self.temperatures.len() == self.size {
            self.temperatures.pop_front();
            self.humidities.pop_front();
        }
        self.temperatures.push_back(temperature);
        self.humidities.push_back(humidity);

        AggregateSample {
            avg_temp: round2(mean(&self.temperatures)),
            avg_hum: round2(mean(&self.humidities)),
        }
    }

    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(AGGREGATE_WINDOW)
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
