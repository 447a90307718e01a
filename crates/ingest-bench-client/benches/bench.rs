use core::{hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ingest_bench_client::client::{
    config::{Compression, IngestionPlan, RunConfig},
    ingestion::orchestrator::StreamOrchestrator,
};
use ingest_bench_core::proto::benchmark_client::BenchmarkClient;
use ingest_bench_server::{BenchmarkService, ServerConfig};
use tokio::{net::TcpListener, runtime::Builder};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Server},
};

#[derive(Clone, Copy, Debug)]
struct IngestBenchParams {
    streams: usize,
    rows: usize,
    columns: usize,
    compression: Compression,
}

const REQUESTS_PER_STREAM: usize = 8;

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("missing local addr");
    let service = BenchmarkService::new(ServerConfig::default());

    tokio::spawn(async move {
        Server::builder()
            .add_service(service.into_server())
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("server failed");
    });

    format!("http://{addr}")
}

fn ingestion_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let url = rt.block_on(start_server());

    let stream_cases = [1, 2, 4, 8];
    let shape_cases = [(100, 10), (1000, 100)];
    let compression_cases = [Compression::None, Compression::Zstd];

    // Generate cartesian product of all param combinations
    let mut cases = Vec::new();
    for &streams in &stream_cases {
        for &(rows, columns) in &shape_cases {
            for &compression in &compression_cases {
                cases.push(IngestBenchParams {
                    streams,
                    rows,
                    columns,
                    compression,
                });
            }
        }
    }

    for params in &cases {
        let mut group = c.benchmark_group("grpc/streaming_ingestion");
        group.sample_size(10);
        group.throughput(Throughput::Elements(
            (params.streams * REQUESTS_PER_STREAM * params.rows * params.columns) as u64,
        ));

        group.bench_function(
            format!(
                "streams/{}/shape/{}x{}/comp/{}",
                params.streams, params.rows, params.columns, params.compression,
            ),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let url = url.clone();
                    async move {
                        let channel = Channel::from_shared(url)
                            .expect("Invalid URI")
                            .connect()
                            .await
                            .expect("Failed to connect to server");
                        let mut client = BenchmarkClient::new(channel);
                        if let Some(encoding) =
                            Option::<CompressionEncoding>::from(params.compression)
                        {
                            client = client.accept_compressed(encoding).send_compressed(encoding);
                        }

                        let orchestrator = StreamOrchestrator::new(
                            client,
                            RunConfig::new(IngestionPlan {
                                streams: params.streams,
                                requests_per_stream: REQUESTS_PER_STREAM,
                                rows: params.rows,
                                columns: params.columns,
                            }),
                        );

                        // Only the measured part of each run counts; frame
                        // construction happens before the run's clock starts.
                        let mut total = Duration::ZERO;
                        for _ in 0..iters {
                            let summary = orchestrator.run().await;
                            assert!(summary.success, "run failed: {:?}", summary.failure);
                            total += summary.elapsed.unwrap_or_default();
                            black_box(summary);
                        }
                        total
                    }
                });
            },
        );

        group.finish();
    }
}

criterion_group!(ingest_benches, ingestion_bench);
criterion_main!(ingest_benches);
