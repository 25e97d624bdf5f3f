// Application layer - emitter, buffer and aggregator use cases
pub mod aggregator;
pub mod buffer;
pub mod emitter;
pub mod sources;
