//! gRPC service implementation for the ingestion benchmark.
//!
//! This module defines [`BenchmarkService`], the concrete implementation of
//! the [`Benchmark`] gRPC service. Its central endpoint is
//! `StreamingIngestion`: every inbound call gets its own
//! [`IngestionCall`] state and a dedicated task that validates frames and
//! streams acks back in order.
//!
//! ## Responsibilities
//!
//! - Serve the trivial spam and unary ingestion calls.
//! - Spawn one receive task per ingestion stream via [`drive_ingestion`].
//! - Track in-flight streams and coordinate graceful shutdown.

use crate::server::{
    config::ServerConfig,
    streaming::{
        coordinator::drive_ingestion,
        processor::{IngestionCall, inspect_frame},
    },
    telemetry::{
        decrement_streams_inflight, increment_requests, increment_stream_errors,
        increment_streams_inflight, record_stream_duration,
    },
};
use core::{pin::Pin, time::Duration};
use ingest_bench_core::{
    Error,
    proto::{
        DataFrame, FrameAck, Int64Msg, SnapshotId,
        benchmark_server::{Benchmark, BenchmarkServer},
    },
};
use portable_atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming, codec::CompressionEncoding};
use tracing::Instrument;

/// Counters shared by every call handled by one service instance.
#[derive(Default)]
struct ServiceState {
    next_call_id: AtomicU64,
    next_snapshot_id: AtomicI64,
    streams_inflight: AtomicUsize,
    draining: AtomicBool,
}

/// gRPC service that validates and acknowledges ingestion frames.
///
/// Cloning is cheap; clones share counters and the shutdown token.
#[derive(Clone)]
pub struct BenchmarkService {
    config: ServerConfig,
    state: Arc<ServiceState>,
    shutdown_token: CancellationToken,
}

impl BenchmarkService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(ServiceState::default()),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Wraps the service in the generated tonic server with compression and
    /// the configured message size limit.
    pub fn into_server(self) -> BenchmarkServer<Self> {
        let max_message_bytes = self.config.max_message_bytes;
        BenchmarkServer::new(self)
            .max_decoding_message_size(max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }

    /// Number of ingestion streams currently being driven.
    pub fn streams_inflight(&self) -> usize {
        self.state.streams_inflight.load(Ordering::Acquire)
    }

    /// Initiates a graceful shutdown.
    ///
    /// - Refuses new streaming and ingestion calls from the moment it is
    ///   invoked.
    /// - Waits up to `shutdown_timeout` seconds for in-flight streams to
    ///   finish.
    /// - Cancels whatever is still running; those calls end with
    ///   `UNAVAILABLE`.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.state.draining.store(true, Ordering::Release);
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );

        let drain = timeout(Duration::from_secs(self.config.shutdown_timeout), async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.streams_inflight()
            ),
        }

        self.shutdown_token.cancel();
        Ok(())
    }

    fn check_accepting(&self) -> Result<(), Status> {
        if self.state.draining.load(Ordering::Acquire) || self.shutdown_token.is_cancelled() {
            increment_stream_errors();
            return Err(Error::ServiceShutdown.into());
        }
        Ok(())
    }
}

/// Decrements the in-flight gauge however the receive task ends.
struct InflightGuard(Arc<ServiceState>);

impl InflightGuard {
    fn enter(state: &Arc<ServiceState>) -> Self {
        state.streams_inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Self(Arc::clone(state))
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.streams_inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

#[tonic::async_trait]
impl Benchmark for BenchmarkService {
    type StreamingSpamStream = ResponseStream<Int64Msg>;
    type StreamingIngestionStream = ResponseStream<FrameAck>;

    async fn unary_spam(&self, _req: Request<Int64Msg>) -> Result<Response<Int64Msg>, Status> {
        increment_requests();
        Ok(Response::new(Int64Msg { value: 0 }))
    }

    /// Streams the integers `0..n` back to the caller.
    #[tracing::instrument(skip_all, fields(n = req.get_ref().value))]
    async fn streaming_spam(
        &self,
        req: Request<Int64Msg>,
    ) -> Result<Response<Self::StreamingSpamStream>, Status> {
        self.check_accepting()?;
        let n = req.get_ref().value;

        if n < 0 {
            return Err(Error::InvalidRequest {
                reason: format!("Count {n} must not be negative"),
            }
            .into());
        }

        if n > self.config.max_spam_count {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Count {} exceeds maximum allowed ({})",
                    n, self.config.max_spam_count
                ),
            }
            .into());
        }

        increment_requests();
        let stream = tokio_stream::iter((0..n).map(|value| Ok(Int64Msg { value })));
        Ok(Response::new(Box::pin(stream)))
    }

    /// Validates a single frame and hands back a fresh snapshot id.
    async fn unary_ingestion(
        &self,
        req: Request<DataFrame>,
    ) -> Result<Response<SnapshotId>, Status> {
        self.check_accepting()?;
        increment_requests();

        let ack = inspect_frame(req.get_ref());
        if ack.data_error {
            tracing::warn!("Rejected unary ingestion: {}", ack.status_message);
            return Err(Error::InvalidRequest {
                reason: ack.status_message,
            }
            .into());
        }

        let snapshot_id = self.state.next_snapshot_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(
            "Ingested snapshot {snapshot_id} ({} x {})",
            ack.row_count,
            ack.col_count
        );
        Ok(Response::new(SnapshotId { snapshot_id }))
    }

    /// Accepts a stream of frames and answers each with a [`FrameAck`].
    ///
    /// The response stream is closed once the client half-closes and every
    /// ack has been queued.
    async fn streaming_ingestion(
        &self,
        req: Request<Streaming<DataFrame>>,
    ) -> Result<Response<Self::StreamingIngestionStream>, Status> {
        self.check_accepting()?;
        increment_requests();

        let call_id = self.state.next_call_id.fetch_add(1, Ordering::Relaxed) + 1;
        let inbound = req.into_inner();
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<FrameAck, Status>>(self.config.ack_buffer_size);

        let guard = InflightGuard::enter(&self.state);
        let shutdown = self.shutdown_token.clone();

        let fut = async move {
            let _guard = guard;
            match drive_ingestion(inbound, resp_tx, IngestionCall::open(call_id), shutdown).await
            {
                Ok(summary) => {
                    record_stream_duration(summary.elapsed.as_secs_f64() * 1000.0);
                }
                Err(e) => {
                    increment_stream_errors();
                    tracing::warn!("Ingestion call {call_id} ended early: {e}");
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("ingestion", call_id)));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_bench_core::frame::build_frame;
    use tonic::Code;

    fn service() -> BenchmarkService {
        BenchmarkService::new(ServerConfig {
            shutdown_timeout: 5,
            ..ServerConfig::default()
        })
    }

    #[tokio::test]
    async fn unary_ingestion_counts_snapshots() {
        let service = service();
        for expected in 1..=3 {
            let id = service
                .unary_ingestion(Request::new(build_frame(4, 2)))
                .await
                .unwrap()
                .into_inner();
            assert_eq!(id.snapshot_id, expected);
        }
    }

    #[tokio::test]
    async fn new_calls_are_refused_while_draining() {
        let service = service();
        let inflight = InflightGuard::enter(&service.state);

        let draining = service.clone();
        let shutdown = tokio::spawn(async move { draining.shutdown().await });
        sleep(Duration::from_millis(50)).await;

        // Still inside the drain window: the token is not cancelled yet.
        assert!(!service.shutdown_token.is_cancelled());
        let status = service
            .unary_ingestion(Request::new(build_frame(4, 2)))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);

        drop(inflight);
        shutdown.await.unwrap().unwrap();
        assert!(service.shutdown_token.is_cancelled());
        assert_eq!(service.streams_inflight(), 0);
    }
}
