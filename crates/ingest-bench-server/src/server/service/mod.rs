//! gRPC service implementation and per-call task spawning.
//!
//! This module contains the client-facing `Benchmark` service. Each ingestion
//! stream is handed to its own task (see [`crate::server::streaming`]); the
//! service itself only tracks shared counters and shutdown.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`BenchmarkService`).

pub mod handler;
