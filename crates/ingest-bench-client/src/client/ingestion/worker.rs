//! A single ingestion stream, driven from open to its terminal signal.
//!
//! The worker splits one call across two tasks:
//!
//! - the send loop (the worker itself) hands the same frame to the call `R`
//!   times, then half-closes;
//! - a receive task owns the ack stream, forwards every ack over an unbounded
//!   channel and fires a one-shot terminal signal when the call ends.
//!
//! The receive task is bound to a child cancellation token whose drop guard
//! lives in the worker, so it never outlives the worker. Every suspension of
//! the send loop is bounded by the stream timeout.

use crate::client::{
    config::RunConfig,
    ingestion::result::{StreamFailure, StreamResult},
    transport::IngestionTransport,
};
use core::time::Duration;
use futures::StreamExt;
use ingest_bench_core::{
    proto::{DataFrame, FrameAck},
    types::VALUE_SIZE,
};
use prost::Message;
use std::sync::Arc;
use tokio::{
    sync::{
        mpsc,
        oneshot::{self, error::TryRecvError},
    },
    time::timeout,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// How a call ended, as seen by the receive task.
#[derive(Debug)]
enum Terminal {
    Completed,
    Failed(Status),
}

/// Outcome of one step of the send loop.
enum Step {
    Sent,
    Terminated(Option<Terminal>),
    RequestSideClosed,
    Stalled,
}

pub struct StreamWorker<T> {
    stream_id: usize,
    transport: T,
    frame: Arc<DataFrame>,
    rows: usize,
    cols: usize,
    requests: usize,
    drain_timeout: Duration,
    frame_buffer: usize,
    cancel: CancellationToken,
}

impl<T: IngestionTransport> StreamWorker<T> {
    /// Creates a worker that sends `frame` once per planned request.
    ///
    /// Acks are checked against the planned rows and columns, not against
    /// the frame. `cancel` should be a child of the run's token; cancelling
    /// it ends the stream as [`StreamFailure::Cancelled`].
    pub fn new(
        stream_id: usize,
        transport: T,
        frame: Arc<DataFrame>,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream_id,
            transport,
            frame,
            rows: config.plan.rows,
            cols: config.plan.columns,
            requests: config.plan.requests_per_stream,
            drain_timeout: config.stream_timeout,
            frame_buffer: config.frame_buffer.max(1),
            cancel,
        }
    }

    pub fn stream_id(&self) -> usize {
        self.stream_id
    }

    /// Runs the stream to completion and reports what happened.
    ///
    /// Never panics on transport faults; every failure is folded into the
    /// returned [`StreamResult`].
    pub async fn run(self) -> StreamResult {
        let _guard = self.cancel.clone().drop_guard();
        let mut result = StreamResult::new(self.stream_id);
        let planned = self.requests as u64;

        let values_per_frame = (self.rows as u64) * (self.cols as u64);
        let data_bytes_per_frame = values_per_frame * VALUE_SIZE as u64;
        let wire_bytes_per_frame = self.frame.encoded_len() as u64;

        let (frame_tx, frame_rx) = mpsc::channel::<DataFrame>(self.frame_buffer);
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<FrameAck>();
        let (done_tx, mut done_rx) = oneshot::channel::<Terminal>();

        tokio::spawn(receive_acks(
            self.transport.clone(),
            ReceiverStream::new(frame_rx),
            ack_tx,
            done_tx,
            self.cancel.clone(),
        ));

        let mut tally = AckTally::new(self.rows, self.cols);
        // `Some` once the terminal signal has been taken; `done_rx` must not be
        // polled after that.
        let mut terminal: Option<Option<Terminal>> = None;

        for _ in 0..self.requests {
            match done_rx.try_recv() {
                Ok(t) => {
                    terminal = Some(Some(t));
                    break;
                }
                Err(TryRecvError::Closed) => {
                    terminal = Some(None);
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            let frame = DataFrame::clone(&self.frame);
            let step = tokio::select! {
                biased;
                t = &mut done_rx => Step::Terminated(t.ok()),
                sent = timeout(self.drain_timeout, frame_tx.send(frame)) => match sent {
                    Ok(Ok(())) => Step::Sent,
                    Ok(Err(_)) => Step::RequestSideClosed,
                    Err(_) => Step::Stalled,
                },
            };

            match step {
                Step::Sent => {
                    result.frames_sent += 1;
                    result.values_submitted += values_per_frame;
                    result.data_bytes_submitted += data_bytes_per_frame;
                    result.wire_bytes_submitted += wire_bytes_per_frame;
                }
                Step::Terminated(t) => {
                    terminal = Some(t);
                    break;
                }
                Step::RequestSideClosed => break,
                Step::Stalled => {
                    while let Ok(ack) = ack_rx.try_recv() {
                        tally.record(&ack);
                    }
                    result.acks_received = tally.received;
                    tracing::warn!(
                        "stream {} stalled after {} frames",
                        self.stream_id,
                        result.frames_sent
                    );
                    return result.fail(StreamFailure::SendStalled(self.drain_timeout));
                }
            }

            while let Ok(ack) = ack_rx.try_recv() {
                tally.record(&ack);
            }
        }

        // End of input.
        drop(frame_tx);

        let terminal = match terminal {
            Some(t) => t,
            None => match timeout(self.drain_timeout, &mut done_rx).await {
                Ok(t) => t.ok(),
                Err(_) => {
                    while let Ok(ack) = ack_rx.try_recv() {
                        tally.record(&ack);
                    }
                    result.acks_received = tally.received;
                    tracing::warn!(
                        "stream {} got no completion within {:?}",
                        self.stream_id,
                        self.drain_timeout
                    );
                    return result.fail(StreamFailure::DrainTimeout(self.drain_timeout));
                }
            },
        };

        // Acks are queued before the terminal signal fires.
        while let Ok(ack) = ack_rx.try_recv() {
            tally.record(&ack);
        }
        result.acks_received = tally.received;

        let failure = match terminal {
            None if self.cancel.is_cancelled() => Some(StreamFailure::Cancelled),
            None => Some(StreamFailure::ReceiveTaskFailed),
            Some(Terminal::Failed(status)) => {
                Some(StreamFailure::Rpc(format!("{:?}: {}", status.code(), status.message())))
            }
            Some(Terminal::Completed) if result.frames_sent < planned => {
                Some(StreamFailure::ClosedEarly {
                    sent: result.frames_sent,
                    planned,
                })
            }
            Some(Terminal::Completed) if tally.mismatches > 0 => {
                Some(StreamFailure::AckMismatch(tally.mismatches))
            }
            Some(Terminal::Completed) if tally.received != planned => {
                Some(StreamFailure::MissingAcks {
                    expected: planned,
                    received: tally.received,
                })
            }
            Some(Terminal::Completed) => None,
        };

        match failure {
            Some(failure) => {
                tracing::warn!("stream {} failed: {failure}", self.stream_id);
                result.fail(failure)
            }
            None => {
                tracing::debug!(
                    "stream {} completed: {} frames acknowledged",
                    self.stream_id,
                    result.acks_received
                );
                result.success = true;
                result
            }
        }
    }
}

/// Receive side of one call.
///
/// Exits without firing the terminal signal when cancelled. A signal that is
/// dropped while the token is still live means the task itself failed.
async fn receive_acks<T: IngestionTransport>(
    transport: T,
    frames: ReceiverStream<DataFrame>,
    ack_tx: mpsc::UnboundedSender<FrameAck>,
    done_tx: oneshot::Sender<Terminal>,
    cancel: CancellationToken,
) {
    let forward = async {
        let mut acks = match transport.open_ingestion(frames).await {
            Ok(acks) => acks,
            Err(status) => return Terminal::Failed(status),
        };

        while let Some(next) = acks.next().await {
            match next {
                Ok(ack) => {
                    if ack_tx.send(ack).is_err() {
                        // Worker is gone; nobody is left to read the outcome.
                        return Terminal::Completed;
                    }
                }
                Err(status) => return Terminal::Failed(status),
            }
        }
        Terminal::Completed
    };

    tokio::select! {
        () = cancel.cancelled() => {}
        terminal = forward => {
            let _ = done_tx.send(terminal);
        }
    }
}

/// Counts acks and checks each against the planned frame shape.
struct AckTally {
    rows: u32,
    cols: u32,
    received: u64,
    mismatches: u64,
}

impl AckTally {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows as u32,
            cols: cols as u32,
            received: 0,
            mismatches: 0,
        }
    }

    fn record(&mut self, ack: &FrameAck) {
        self.received += 1;
        if ack.data_error || ack.row_count != self.rows || ack.col_count != self.cols {
            if self.mismatches == 0 {
                tracing::error!(
                    "ack mismatch (rows {}/{}, cols {}/{}): {}",
                    ack.row_count,
                    self.rows,
                    ack.col_count,
                    self.cols,
                    ack.status_message
                );
            }
            self.mismatches += 1;
        }
    }
}
