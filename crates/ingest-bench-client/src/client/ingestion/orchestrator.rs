use crate::client::{
    config::RunConfig,
    ingestion::{
        result::{RunFailure, StreamResult, StreamSummary, merge},
        worker::StreamWorker,
    },
    transport::IngestionTransport,
};
use futures::stream::{FuturesUnordered, StreamExt};
use ingest_bench_core::{frame::build_frame, proto::DataFrame};
use std::{sync::Arc, time::Instant};
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Builds the frame for a stream from `(stream_id, rows, columns)`.
pub type FrameFactory = Arc<dyn Fn(usize, usize, usize) -> DataFrame + Send + Sync>;

/// Runs `N` ingestion streams against one transport and merges their results.
///
/// Stream ids are 1-indexed. Each stream gets its own frame, built before the
/// clock starts.
pub struct StreamOrchestrator<T> {
    transport: T,
    config: RunConfig,
    frame_factory: FrameFactory,
}

impl<T: IngestionTransport> StreamOrchestrator<T> {
    pub fn new(transport: T, config: RunConfig) -> Self {
        Self {
            transport,
            config,
            frame_factory: Arc::new(|_, rows, cols| build_frame(rows, cols)),
        }
    }

    /// Replaces the default frame builder, e.g. to corrupt a single stream.
    pub fn with_frame_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize, usize, usize) -> DataFrame + Send + Sync + 'static,
    {
        self.frame_factory = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes one run.
    ///
    /// A single stream runs inline on the caller's task; more are spawned
    /// onto the runtime. Collection is bounded by the run timeout. On the
    /// deadline, or if a stream task cannot be joined, outstanding streams
    /// are cancelled and the summary carries no elapsed time.
    pub async fn run(&self) -> StreamSummary {
        let plan = self.config.plan;
        let run_token = CancellationToken::new();

        let workers: Vec<_> = (1..=plan.streams)
            .map(|stream_id| {
                let frame = (self.frame_factory)(stream_id, plan.rows, plan.columns);
                StreamWorker::new(
                    stream_id,
                    self.transport.clone(),
                    Arc::new(frame),
                    &self.config,
                    run_token.child_token(),
                )
            })
            .collect();

        tracing::info!(
            "starting run: {} stream(s) x {} request(s) of {} x {}",
            plan.streams,
            plan.requests_per_stream,
            plan.rows,
            plan.columns
        );

        let started = Instant::now();
        let mut results = Vec::with_capacity(workers.len());

        let outcome = if workers.len() == 1 {
            let mut workers = workers;
            match workers.pop() {
                Some(worker) => {
                    let span = tracing::info_span!("stream", stream_id = worker.stream_id());
                    match timeout(self.config.run_timeout, worker.run().instrument(span)).await {
                        Ok(result) => {
                            results.push(result);
                            Ok(())
                        }
                        Err(_) => Err(RunFailure::DeadlineExceeded(self.config.run_timeout)),
                    }
                }
                None => Ok(()),
            }
        } else {
            let mut tasks: FuturesUnordered<JoinHandle<StreamResult>> = workers
                .into_iter()
                .map(|worker| {
                    let span = tracing::info_span!("stream", stream_id = worker.stream_id());
                    tokio::spawn(worker.run().instrument(span))
                })
                .collect();

            let collected = timeout(self.config.run_timeout, async {
                while let Some(joined) = tasks.next().await {
                    match joined {
                        Ok(result) => results.push(result),
                        Err(e) => return Err(RunFailure::Scheduling(e.to_string())),
                    }
                }
                Ok(())
            })
            .await
            .unwrap_or(Err(RunFailure::DeadlineExceeded(self.config.run_timeout)));

            if collected.is_err() {
                run_token.cancel();
                for task in tasks.iter() {
                    task.abort();
                }
            }
            collected
        };

        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                let summary = merge(results, elapsed);
                tracing::info!(
                    "run finished in {:.3}s (success: {})",
                    elapsed.as_secs_f64(),
                    summary.success
                );
                summary
            }
            Err(failure) => {
                tracing::error!("run aborted: {failure}");
                run_token.cancel();
                StreamSummary::aborted(failure, results)
            }
        }
    }
}
