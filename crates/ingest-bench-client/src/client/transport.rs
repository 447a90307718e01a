use core::pin::Pin;
use futures::{Stream, StreamExt};
use ingest_bench_core::proto::{DataFrame, FrameAck, benchmark_client::BenchmarkClient};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Status, transport::Channel};

/// Acks of one ingestion call. The stream ends when the server completes the
/// call and yields an `Err` if it terminates it with an error.
pub type AckStream = Pin<Box<dyn Stream<Item = Result<FrameAck, Status>> + Send>>;

/// Opens streaming ingestion calls.
///
/// Workers only ever see this trait, so a run can be pointed at a real tonic
/// channel or at an in-memory transport in tests.
#[tonic::async_trait]
pub trait IngestionTransport: Clone + Send + Sync + 'static {
    /// Starts a call fed by `frames`. Dropping the sending half of `frames`
    /// half-closes the call.
    async fn open_ingestion(&self, frames: ReceiverStream<DataFrame>) -> Result<AckStream, Status>;
}

#[tonic::async_trait]
impl IngestionTransport for BenchmarkClient<Channel> {
    async fn open_ingestion(&self, frames: ReceiverStream<DataFrame>) -> Result<AckStream, Status> {
        // The generated client needs `&mut self`; clones share the channel.
        let mut client = self.clone();
        let acks = client.streaming_ingestion(frames).await?.into_inner();
        Ok(acks.boxed())
    }
}
