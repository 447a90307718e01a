//! # Shared constants for the ingestion benchmark
//!
//! Client and server agree on how a frame's payload is weighed and on the
//! default bounds of a run. Keeping them here means both sides account for
//! bytes the same way.
//!
//! ## Constants
//!
//! - [`VALUE_SIZE`] - Size (in bytes) of one numeric value in a frame
//! - [`DEFAULT_STREAM_TIMEOUT`] - Bounded wait for a stream's terminal signal
//! - [`DEFAULT_RUN_TIMEOUT`] - Bounded wait for all streams of a run

use core::time::Duration;

/// Scalar type carried by every cell of a benchmark frame.
pub type Value = f64;

/// The number of data bytes one value contributes to a frame.
///
/// Wire bytes are measured separately from the encoded message length; the
/// difference between the two is the protocol overhead.
pub const VALUE_SIZE: usize = core::mem::size_of::<Value>();

/// How long a worker waits for its stream to complete after end-of-input.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// How long an orchestrator waits for every stream of a run to report.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);
