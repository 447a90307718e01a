#![doc = include_str!("../README.md")]

pub mod client;

pub use client::{
    config::{ClientConfig, RunConfig},
    ingestion::{orchestrator::StreamOrchestrator, result::StreamSummary},
    transport::IngestionTransport,
};
