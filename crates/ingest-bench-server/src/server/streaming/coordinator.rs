use super::processor::{CallSummary, IngestionCall};
use crate::server::telemetry::{increment_data_errors, increment_frames_received};
use futures::{Stream, StreamExt};
use ingest_bench_core::{
    Error,
    proto::{DataFrame, FrameAck},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Reads one call's inbound frames and forwards an ack for each.
///
/// Frames are handled strictly in arrival order by this single task, which
/// owns the call's [`IngestionCall`] state.
///
/// # Arguments
///
/// - `inbound`: The client's frame stream (a `tonic::Streaming` in production).
/// - `resp_tx`: Channel feeding the call's response stream.
/// - `call`: Freshly opened per-call state.
/// - `shutdown`: Service-wide token; once cancelled the call is ended with
///   `UNAVAILABLE`.
///
/// # Behavior
///
/// - End of input: `resp_tx` is dropped, closing the response stream, and the
///   call's summary is returned.
/// - Inbound error: the call state is discarded without a final ack.
/// - Response channel closed (client went away): returns a channel error.
pub async fn drive_ingestion<S>(
    mut inbound: S,
    resp_tx: mpsc::Sender<Result<FrameAck, Status>>,
    mut call: IngestionCall,
    shutdown: CancellationToken,
) -> ingest_bench_core::Result<CallSummary>
where
    S: Stream<Item = Result<DataFrame, Status>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!("call {} interrupted by shutdown", call.call_id());
                if let Err(_e) = resp_tx.send(Err(Error::ServiceShutdown.into())).await {
                    tracing::debug!("Failed to forward shutdown to call {}", call.call_id());
                }
                return Err(Error::ServiceShutdown);
            }
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                let ack = call.on_frame(&frame);
                increment_frames_received();
                if ack.data_error {
                    increment_data_errors();
                }

                if let Err(e) = resp_tx.send(Ok(ack)).await {
                    return Err(Error::ChannelError {
                        context: format!("Failed to forward ack for call {}: {e}", call.call_id()),
                    });
                }
            }
            Some(Err(status)) => {
                call.on_error(&status);
                return Err(Error::Rpc(status));
            }
            None => {
                drop(resp_tx);
                return Ok(call.on_complete());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_bench_core::frame::build_frame;
    use tokio_stream::wrappers::ReceiverStream;

    #[tokio::test]
    async fn acks_every_frame_then_closes() {
        let frames = vec![Ok(build_frame(4, 3)); 5];
        let (resp_tx, mut resp_rx) = mpsc::channel(8);

        let summary = drive_ingestion(
            futures::stream::iter(frames),
            resp_tx,
            IngestionCall::open(1),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(summary.request_count, 5);

        let mut acks = Vec::new();
        while let Some(ack) = resp_rx.recv().await {
            acks.push(ack.unwrap());
        }
        assert_eq!(acks.len(), 5);
        assert!(acks.iter().all(|a| a.row_count == 4 && a.col_count == 3 && !a.data_error));
    }

    #[tokio::test]
    async fn inbound_error_ends_call_without_final_ack() {
        let frames = vec![
            Ok(build_frame(2, 2)),
            Err(Status::aborted("client reset")),
            Ok(build_frame(2, 2)),
        ];
        let (resp_tx, mut resp_rx) = mpsc::channel(8);

        let res = drive_ingestion(
            futures::stream::iter(frames),
            resp_tx,
            IngestionCall::open(2),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(res, Err(Error::Rpc(ref s)) if s.code() == tonic::Code::Aborted));

        assert!(resp_rx.recv().await.unwrap().is_ok());
        assert!(resp_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_interrupts_an_idle_call() {
        let (_frame_tx, frame_rx) = mpsc::channel::<Result<DataFrame, Status>>(1);
        let (resp_tx, mut resp_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(drive_ingestion(
            ReceiverStream::new(frame_rx),
            resp_tx,
            IngestionCall::open(3),
            shutdown.clone(),
        ));
        shutdown.cancel();

        assert!(matches!(task.await.unwrap(), Err(Error::ServiceShutdown)));
        let status = resp_rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }

    #[tokio::test]
    async fn departed_client_is_a_channel_error() {
        let (resp_tx, resp_rx) = mpsc::channel(1);
        drop(resp_rx);

        let res = drive_ingestion(
            futures::stream::iter(vec![Ok(build_frame(1, 1))]),
            resp_tx,
            IngestionCall::open(4),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(res, Err(Error::ChannelError { .. })));
    }
}
