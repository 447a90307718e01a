use ingest_bench_core::proto::benchmark_client::BenchmarkClient;
use ingest_bench_server::{BenchmarkService, ServerConfig};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};

/// Starts a benchmark server on an ephemeral port and returns a client
/// connected to it. The server lives until the test runtime shuts down.
pub async fn spawn_server() -> BenchmarkClient<Channel> {
    spawn_server_with(ServerConfig::default()).await
}

pub async fn spawn_server_with(config: ServerConfig) -> BenchmarkClient<Channel> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = BenchmarkService::new(config);

    tokio::spawn(async move {
        Server::builder()
            .add_service(service.into_server())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let channel = Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    BenchmarkClient::new(channel)
}
