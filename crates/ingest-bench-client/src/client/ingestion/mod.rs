//! Multi-stream ingestion runs.
//!
//! - [`worker`]: one stream, from open to its terminal signal.
//! - [`orchestrator`]: runs `N` workers under a shared deadline.
//! - [`result`]: per-stream results, merging and rate reporting.

pub mod orchestrator;
pub mod result;
pub mod worker;
