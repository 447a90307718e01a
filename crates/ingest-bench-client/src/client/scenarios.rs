//! The client's benchmark scenarios.
//!
//! Streaming ingestion is the main benchmark; the other scenarios are quick
//! exercises of the same service and share its transport settings.

use crate::client::{
    config::RunConfig,
    ingestion::{orchestrator::StreamOrchestrator, result::StreamSummary},
    transport::IngestionTransport,
};
use core::{fmt, time::Duration};
use futures::StreamExt;
use ingest_bench_core::{
    frame::build_frame,
    proto::{Int64Msg, benchmark_client::BenchmarkClient},
    types::VALUE_SIZE,
};
use std::time::Instant;
use tonic::{Status, transport::Channel};

const MEGABYTE: f64 = 1_000_000.0;

/// Sends one echo request and returns the server's answer.
pub async fn unary_spam(client: &mut BenchmarkClient<Channel>, value: i64) -> Result<i64, Status> {
    let response = client.unary_spam(Int64Msg { value }).await?;
    Ok(response.into_inner().value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpamReport {
    pub received: u64,
    pub elapsed: Duration,
}

impl SpamReport {
    /// Messages per second; `None` if the transfer was too fast to time.
    pub fn rate(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.received as f64 / secs)
    }
}

impl fmt::Display for SpamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {} messages in {:.3}s",
            self.received,
            self.elapsed.as_secs_f64()
        )?;
        match self.rate() {
            Some(rate) => write!(f, " ({rate:.0} msg/sec)"),
            None => write!(f, " (rate undefined)"),
        }
    }
}

/// Asks the server for `count` integers and counts what arrives.
pub async fn streaming_spam(
    client: &mut BenchmarkClient<Channel>,
    count: i64,
) -> Result<SpamReport, Status> {
    let started = Instant::now();
    let mut stream = client
        .streaming_spam(Int64Msg { value: count })
        .await?
        .into_inner();

    let mut received = 0;
    while let Some(msg) = stream.next().await {
        msg?;
        received += 1;
    }

    Ok(SpamReport {
        received,
        elapsed: started.elapsed(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryIngestionReport {
    pub requests: usize,
    pub data_bytes_submitted: u64,
    pub last_snapshot_id: i64,
    pub elapsed: Duration,
}

impl UnaryIngestionReport {
    pub fn megabytes(&self) -> f64 {
        self.data_bytes_submitted as f64 / MEGABYTE
    }

    /// MB per second; `None` if the run was too fast to time.
    pub fn megabytes_per_sec(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.megabytes() / secs)
    }
}

impl fmt::Display for UnaryIngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {:.2} MB in {:.3}s",
            self.requests,
            self.megabytes(),
            self.elapsed.as_secs_f64()
        )?;
        match self.megabytes_per_sec() {
            Some(rate) => write!(f, " ({rate:.2} MB/sec)"),
            None => write!(f, " (rate undefined)"),
        }
    }
}

/// Sends `requests` frames of `rows` x `columns`, one unary call at a time.
pub async fn unary_ingestion(
    client: &mut BenchmarkClient<Channel>,
    rows: usize,
    columns: usize,
    requests: usize,
) -> Result<UnaryIngestionReport, Status> {
    let frame = build_frame(rows, columns);
    let bytes_per_frame = (rows * columns * VALUE_SIZE) as u64;

    let started = Instant::now();
    let mut last_snapshot_id = 0;
    for _ in 0..requests {
        last_snapshot_id = client
            .unary_ingestion(frame.clone())
            .await?
            .into_inner()
            .snapshot_id;
    }

    Ok(UnaryIngestionReport {
        requests,
        data_bytes_submitted: bytes_per_frame * requests as u64,
        last_snapshot_id,
        elapsed: started.elapsed(),
    })
}

/// Runs the multi-stream benchmark and logs its outcome.
pub async fn streaming_ingestion<T: IngestionTransport>(
    transport: T,
    config: RunConfig,
) -> StreamSummary {
    let summary = StreamOrchestrator::new(transport, config).run().await;

    match summary.report() {
        Some(report) => tracing::info!("streaming ingestion finished\n{report}"),
        None => {
            for stream in summary.streams.iter().filter(|s| !s.success) {
                tracing::error!(
                    "stream {} failed after {} frames / {} acks: {}",
                    stream.stream_id,
                    stream.frames_sent,
                    stream.acks_received,
                    stream
                        .failure
                        .as_ref()
                        .map_or_else(|| String::from("unknown"), ToString::to_string)
                );
            }
            match &summary.failure {
                Some(failure) => tracing::error!("run failed ({failure}); results are invalid"),
                None => tracing::error!("error detected in streamed data; results are invalid"),
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spam_rate_is_undefined_without_elapsed_time() {
        let report = SpamReport {
            received: 10,
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.rate(), None);
        assert!(report.to_string().contains("undefined"));
    }

    #[test]
    fn unary_report_in_megabytes() {
        let report = UnaryIngestionReport {
            requests: 10,
            data_bytes_submitted: 4_000_000,
            last_snapshot_id: 10,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(report.megabytes(), 4.0);
        assert_eq!(report.megabytes_per_sec(), Some(2.0));
        assert_eq!(report.to_string(), "10 requests, 4.00 MB in 2.000s (2.00 MB/sec)");
    }
}
