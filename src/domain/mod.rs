// Domain layer - wire records, display points and bounded series
pub mod dashboard;
pub mod display;
pub mod reading;
pub mod series;
pub mod window;
