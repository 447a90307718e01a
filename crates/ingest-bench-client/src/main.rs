use clap::Parser;
use ingest_bench_client::client::{
    config::{CliArgs, ClientConfig, Scenario},
    scenarios,
    telemetry::init_telemetry,
};
use ingest_bench_core::proto::benchmark_client::BenchmarkClient;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    init_telemetry()?;

    let mut client = connect(&config).await?;

    match config.scenario {
        Scenario::UnarySpam { value } => {
            let answer = scenarios::unary_spam(&mut client, value).await?;
            tracing::info!("unary spam sent {value}, received {answer}");
        }
        Scenario::StreamingSpam { count } => {
            let report = scenarios::streaming_spam(&mut client, count).await?;
            tracing::info!("streaming spam: {report}");
        }
        Scenario::UnaryIngestion {
            rows,
            columns,
            requests,
        } => {
            let report = scenarios::unary_ingestion(&mut client, rows, columns, requests).await?;
            tracing::info!("unary ingestion: {report}");
        }
        Scenario::StreamingIngestion(run) => {
            let summary = scenarios::streaming_ingestion(client, run).await;
            if !summary.success {
                anyhow::bail!("streaming ingestion failed");
            }
        }
    }

    Ok(())
}

async fn connect(config: &ClientConfig) -> anyhow::Result<BenchmarkClient<Channel>> {
    tracing::info!(
        "Connecting to {} (compression: {})",
        config.server_url,
        config.compression
    );

    let channel = Endpoint::from_shared(config.server_url.clone())?
        .connect_timeout(config.connect_timeout)
        .tcp_nodelay(true)
        .connect()
        .await?;

    let mut client = BenchmarkClient::new(channel)
        .max_decoding_message_size(usize::MAX)
        .max_encoding_message_size(usize::MAX);
    if let Some(encoding) = Option::<CompressionEncoding>::from(config.compression) {
        client = client.send_compressed(encoding).accept_compressed(encoding);
    }
    Ok(client)
}
