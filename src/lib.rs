// Real-time telemetry synchronisation: push emitter, aggregator and dual-source buffer
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;
