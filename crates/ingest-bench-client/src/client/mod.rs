pub mod config;
pub mod ingestion;
pub mod scenarios;
pub mod telemetry;
pub mod transport;
