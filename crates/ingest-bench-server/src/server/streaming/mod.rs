//! Per-call handling of `StreamingIngestion`.
//!
//! - [`processor`] - per-call state and frame validation.
//! - [`coordinator`] - the receive loop that turns frames into acks.

pub mod coordinator;
pub mod processor;
