pub mod config;
pub mod data_shift;
pub mod deals;
pub mod error;
pub mod telemetry;
