// Presentation layer - HTTP surface and the log renderer
pub mod app_state;
pub mod handlers;
pub mod renderer;
pub mod routes;
