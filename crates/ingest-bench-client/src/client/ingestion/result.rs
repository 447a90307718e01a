//! Per-stream results, run summaries and rate reporting.
//!
//! Merging is a plain sum of counters plus a logical AND of success flags, so
//! the order in which streams report does not matter.

use core::{fmt, time::Duration};

/// Why a single stream did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    /// The call ended before every planned frame was handed to the transport.
    #[error("stream closed after {sent} of {planned} frames")]
    ClosedEarly { sent: u64, planned: u64 },

    /// The call terminated with an error status.
    #[error("stream terminated with error: {0}")]
    Rpc(String),

    /// No terminal signal arrived within the drain timeout.
    #[error("no completion within {0:?}")]
    DrainTimeout(Duration),

    /// The call stopped accepting frames without ending.
    #[error("frame not accepted within {0:?}")]
    SendStalled(Duration),

    /// The receive task ended without reporting how the call ended.
    #[error("receive task exited without a terminal signal")]
    ReceiveTaskFailed,

    /// At least one ack reported a data error or unexpected dimensions.
    #[error("{0} ack(s) reported a mismatch")]
    AckMismatch(u64),

    /// The call completed without acknowledging every frame.
    #[error("expected {expected} acks but received {received}")]
    MissingAcks { expected: u64, received: u64 },

    /// The run cancelled the stream.
    #[error("stream cancelled")]
    Cancelled,
}

/// Why a whole run did not produce a verified result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunFailure {
    #[error("run deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("stream task failed: {0}")]
    Scheduling(String),
}

/// Outcome of one stream, handed to the orchestrator when the worker ends.
///
/// Counters are filled in even when `success` is false; in that case they
/// describe what was attempted, not what was verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamResult {
    pub stream_id: usize,
    pub success: bool,
    pub values_submitted: u64,
    pub data_bytes_submitted: u64,
    pub wire_bytes_submitted: u64,
    pub frames_sent: u64,
    pub acks_received: u64,
    pub failure: Option<StreamFailure>,
}

impl StreamResult {
    pub fn new(stream_id: usize) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }

    pub(crate) fn fail(mut self, failure: StreamFailure) -> Self {
        self.success = false;
        self.failure = Some(failure);
        self
    }
}

/// Merged outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub success: bool,
    pub values_submitted: u64,
    pub data_bytes_submitted: u64,
    pub wire_bytes_submitted: u64,
    /// Wall-clock time of the run; `None` when the run did not complete.
    pub elapsed: Option<Duration>,
    /// Every collected stream result, ordered by stream id.
    pub streams: Vec<StreamResult>,
    pub failure: Option<RunFailure>,
}

impl StreamSummary {
    /// Summary of a run that was cut short. Results collected before the
    /// failure are kept for diagnostics.
    pub fn aborted(failure: RunFailure, collected: Vec<StreamResult>) -> Self {
        let mut summary = merge(collected, Duration::ZERO);
        summary.success = false;
        summary.elapsed = None;
        summary.failure = Some(failure);
        summary
    }

    pub fn stream(&self, stream_id: usize) -> Option<&StreamResult> {
        self.streams.iter().find(|s| s.stream_id == stream_id)
    }

    /// Derives throughput figures for a verified run.
    ///
    /// Returns `None` when the run failed or has no measured elapsed time; a
    /// rate over an unverified run would be misleading.
    pub fn report(&self) -> Option<RateReport> {
        if !self.success {
            return None;
        }
        let elapsed = self.elapsed?;
        let secs = elapsed.as_secs_f64();
        let rate = |total: u64| (secs > 0.0).then(|| total as f64 / secs);

        Some(RateReport {
            elapsed,
            values_submitted: self.values_submitted,
            data_bytes_submitted: self.data_bytes_submitted,
            wire_bytes_submitted: self.wire_bytes_submitted,
            overhead_bytes: self.wire_bytes_submitted as i64 - self.data_bytes_submitted as i64,
            value_rate: rate(self.values_submitted),
            data_byte_rate: rate(self.data_bytes_submitted),
            wire_byte_rate: rate(self.wire_bytes_submitted),
        })
    }
}

/// Merges per-stream results into one summary.
///
/// The run succeeds only if every stream succeeded and at least one stream
/// reported. Totals include failed streams.
pub fn merge(mut results: Vec<StreamResult>, elapsed: Duration) -> StreamSummary {
    results.sort_by_key(|r| r.stream_id);

    let mut summary = StreamSummary {
        success: !results.is_empty(),
        values_submitted: 0,
        data_bytes_submitted: 0,
        wire_bytes_submitted: 0,
        elapsed: Some(elapsed),
        streams: Vec::new(),
        failure: None,
    };

    for r in &results {
        summary.success &= r.success;
        summary.values_submitted += r.values_submitted;
        summary.data_bytes_submitted += r.data_bytes_submitted;
        summary.wire_bytes_submitted += r.wire_bytes_submitted;
    }
    summary.streams = results;
    summary
}

/// Throughput of a verified run. Rates are per second; `None` means the
/// elapsed time was too short to measure.
#[derive(Debug, Clone, PartialEq)]
pub struct RateReport {
    pub elapsed: Duration,
    pub values_submitted: u64,
    pub data_bytes_submitted: u64,
    pub wire_bytes_submitted: u64,
    pub overhead_bytes: i64,
    pub value_rate: Option<f64>,
    pub data_byte_rate: Option<f64>,
    pub wire_byte_rate: Option<f64>,
}

const MEGABYTE: f64 = 1_000_000.0;

struct Rate(Option<f64>, f64, &'static str);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.2} {}", v / self.1, self.2),
            None => write!(f, "undefined (elapsed time below clock resolution)"),
        }
    }
}

impl fmt::Display for RateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data values submitted: {}", self.values_submitted)?;
        writeln!(f, "data bytes submitted: {}", self.data_bytes_submitted)?;
        writeln!(f, "grpc bytes submitted: {}", self.wire_bytes_submitted)?;
        writeln!(f, "grpc overhead bytes: {}", self.overhead_bytes)?;
        writeln!(f, "execution time: {:.2} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "data value rate: {}", Rate(self.value_rate, 1.0, "values/sec"))?;
        writeln!(f, "data byte rate: {}", Rate(self.data_byte_rate, MEGABYTE, "MB/sec"))?;
        write!(f, "grpc byte rate: {}", Rate(self.wire_byte_rate, MEGABYTE, "MB/sec"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(stream_id: usize, values: u64) -> StreamResult {
        StreamResult {
            stream_id,
            success: true,
            values_submitted: values,
            data_bytes_submitted: values * 8,
            wire_bytes_submitted: values * 11,
            frames_sent: 1,
            acks_received: 1,
            failure: None,
        }
    }

    #[test]
    fn merge_sums_and_ands() {
        let summary = merge(vec![ok(2, 10), ok(1, 5)], Duration::from_secs(1));
        assert!(summary.success);
        assert_eq!(summary.values_submitted, 15);
        assert_eq!(summary.data_bytes_submitted, 120);
        assert_eq!(summary.wire_bytes_submitted, 165);
        assert_eq!(summary.streams[0].stream_id, 1);
        assert_eq!(summary.streams[1].stream_id, 2);
    }

    #[test]
    fn one_failure_fails_the_run_but_keeps_totals() {
        let failed = ok(2, 7).fail(StreamFailure::AckMismatch(1));
        let summary = merge(vec![ok(1, 5), failed, ok(3, 5)], Duration::from_secs(1));

        assert!(!summary.success);
        assert_eq!(summary.values_submitted, 17);
        assert!(summary.stream(1).unwrap().success);
        assert!(!summary.stream(2).unwrap().success);
        assert!(summary.stream(3).unwrap().success);
        assert!(summary.report().is_none());
    }

    #[test]
    fn merge_is_order_independent() {
        let a = merge(vec![ok(1, 3), ok(2, 4), ok(3, 5)], Duration::from_millis(5));
        let b = merge(vec![ok(3, 5), ok(1, 3), ok(2, 4)], Duration::from_millis(5));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_run_is_not_a_success() {
        let summary = merge(Vec::new(), Duration::from_secs(1));
        assert!(!summary.success);
        assert!(summary.report().is_none());
    }

    #[test]
    fn report_computes_rates() {
        let summary = merge(vec![ok(1, 1_000)], Duration::from_secs(2));
        let report = summary.report().unwrap();

        assert_eq!(report.value_rate, Some(500.0));
        assert_eq!(report.data_byte_rate, Some(4_000.0));
        assert_eq!(report.wire_byte_rate, Some(5_500.0));
        assert_eq!(report.overhead_bytes, 3_000);
        assert!(report.to_string().contains("data value rate: 500.00 values/sec"));
    }

    #[test]
    fn zero_elapsed_leaves_rates_undefined() {
        let summary = merge(vec![ok(1, 1_000)], Duration::ZERO);
        let report = summary.report().unwrap();

        assert_eq!(report.value_rate, None);
        assert_eq!(report.data_byte_rate, None);
        assert_eq!(report.wire_byte_rate, None);
        assert!(report.to_string().contains("undefined"));
    }

    #[test]
    fn aborted_runs_report_no_rate() {
        let summary = StreamSummary::aborted(
            RunFailure::DeadlineExceeded(Duration::from_secs(60)),
            vec![ok(1, 10)],
        );
        assert!(!summary.success);
        assert_eq!(summary.elapsed, None);
        assert_eq!(summary.values_submitted, 10);
        assert!(summary.report().is_none());
    }
}
