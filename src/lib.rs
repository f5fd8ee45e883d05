pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod labels;
pub mod model;
pub mod models;
pub mod preprocess;
pub mod server;
pub mod telemetry;
