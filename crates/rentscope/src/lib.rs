pub mod config;
pub mod error;
pub mod pricing;
pub mod schema;
pub mod telemetry;
