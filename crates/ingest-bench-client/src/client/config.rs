use anyhow::bail;
use clap::{Args, Parser, Subcommand, ValueEnum};
use core::{fmt, time::Duration};
use ingest_bench_core::types::{DEFAULT_RUN_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use tonic::codec::CompressionEncoding;

/// Command line for the `ingest-bench-client` binary.
///
/// Connection settings are global; each subcommand selects one scenario and
/// carries its own sizing flags.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ingest-bench-client",
    version,
    about = "Drives concurrent gRPC ingestion streams and reports throughput"
)]
pub struct CliArgs {
    /// URL of the benchmark server.
    ///
    /// Environment variable: `SERVER_URL`
    #[arg(long, env = "SERVER_URL", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub server_url: String,

    /// Compression applied to outbound messages.
    ///
    /// Environment variable: `COMPRESSION`
    #[arg(long, env = "COMPRESSION", value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    /// Seconds allowed for establishing the connection.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_SECS`
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[command(subcommand)]
    pub scenario: ScenarioArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScenarioArgs {
    /// Sends one echo request.
    UnarySpam {
        #[arg(long, default_value_t = 42)]
        value: i64,
    },
    /// Asks the server to stream `count` integers and times the transfer.
    StreamingSpam {
        #[arg(long, default_value_t = 1_000_000)]
        count: i64,
    },
    /// Sends frames one at a time over unary calls.
    UnaryIngestion {
        #[arg(long, default_value_t = 1000)]
        rows: usize,
        #[arg(long, default_value_t = 100)]
        columns: usize,
        #[arg(long, default_value_t = 1000)]
        requests: usize,
    },
    /// Runs concurrent ingestion streams (the throughput benchmark).
    StreamingIngestion(IngestionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestionArgs {
    /// Number of concurrent streams.
    ///
    /// Environment variable: `STREAMS`
    #[arg(long, env = "STREAMS", default_value_t = 2)]
    pub streams: usize,

    /// Frames sent on each stream.
    ///
    /// Environment variable: `REQUESTS_PER_STREAM`
    #[arg(long, env = "REQUESTS_PER_STREAM", default_value_t = 480)]
    pub requests: usize,

    /// Rows per frame.
    #[arg(long, env = "ROWS", default_value_t = 1000)]
    pub rows: usize,

    /// Columns per frame.
    #[arg(long, env = "COLUMNS", default_value_t = 250)]
    pub columns: usize,

    /// Seconds the whole run may take before it is cancelled.
    #[arg(long, env = "RUN_TIMEOUT_SECS", default_value_t = DEFAULT_RUN_TIMEOUT.as_secs())]
    pub run_timeout_secs: u64,

    /// Seconds a stream may wait for the server to complete after its last
    /// frame.
    #[arg(long, env = "STREAM_TIMEOUT_SECS", default_value_t = DEFAULT_STREAM_TIMEOUT.as_secs())]
    pub stream_timeout_secs: u64,

    /// Frames buffered between a stream's send loop and the transport.
    #[arg(long, env = "FRAME_BUFFER", default_value_t = 16)]
    pub frame_buffer: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Deflate => write!(f, "deflate"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Deflate => Some(CompressionEncoding::Deflate),
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

/// Shape of one streaming ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionPlan {
    pub streams: usize,
    pub requests_per_stream: usize,
    pub rows: usize,
    pub columns: usize,
}

impl IngestionPlan {
    pub const fn values_per_frame(&self) -> u64 {
        (self.rows as u64) * (self.columns as u64)
    }
}

/// Everything a [`StreamOrchestrator`] needs for one run.
///
/// [`StreamOrchestrator`]: crate::client::ingestion::orchestrator::StreamOrchestrator
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub plan: IngestionPlan,
    pub run_timeout: Duration,
    pub stream_timeout: Duration,
    pub frame_buffer: usize,
}

impl RunConfig {
    pub fn new(plan: IngestionPlan) -> Self {
        Self {
            plan,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            frame_buffer: 16,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn with_stream_timeout(mut self, stream_timeout: Duration) -> Self {
        self.stream_timeout = stream_timeout;
        self
    }
}

impl TryFrom<IngestionArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: IngestionArgs) -> Result<Self, Self::Error> {
        if args.streams == 0 {
            bail!("STREAMS must be greater than 0");
        }
        if args.requests == 0 {
            bail!("REQUESTS_PER_STREAM must be greater than 0");
        }
        if args.rows == 0 || args.columns == 0 {
            bail!(
                "frames must have at least one row and column (got {} x {})",
                args.rows,
                args.columns
            );
        }
        if args.frame_buffer == 0 {
            bail!("FRAME_BUFFER must be greater than 0");
        }

        Ok(Self {
            plan: IngestionPlan {
                streams: args.streams,
                requests_per_stream: args.requests,
                rows: args.rows,
                columns: args.columns,
            },
            run_timeout: Duration::from_secs(args.run_timeout_secs),
            stream_timeout: Duration::from_secs(args.stream_timeout_secs),
            frame_buffer: args.frame_buffer,
        })
    }
}

/// Validated form of a [`ScenarioArgs`].
#[derive(Debug, Clone)]
pub enum Scenario {
    UnarySpam { value: i64 },
    StreamingSpam { count: i64 },
    UnaryIngestion { rows: usize, columns: usize, requests: usize },
    StreamingIngestion(RunConfig),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub compression: Compression,
    pub connect_timeout: Duration,
    pub scenario: Scenario,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let scenario = match args.scenario {
            ScenarioArgs::UnarySpam { value } => Scenario::UnarySpam { value },
            ScenarioArgs::StreamingSpam { count } => {
                if count < 0 {
                    bail!("count ({count}) must not be negative");
                }
                Scenario::StreamingSpam { count }
            }
            ScenarioArgs::UnaryIngestion {
                rows,
                columns,
                requests,
            } => {
                if rows == 0 || columns == 0 || requests == 0 {
                    bail!("rows, columns and requests must all be greater than 0");
                }
                Scenario::UnaryIngestion {
                    rows,
                    columns,
                    requests,
                }
            }
            ScenarioArgs::StreamingIngestion(ingestion) => {
                Scenario::StreamingIngestion(RunConfig::try_from(ingestion)?)
            }
        };

        Ok(Self {
            server_url: args.server_url,
            compression: args.compression,
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            scenario,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_streaming_ingestion_flags() {
        let args = CliArgs::parse_from([
            "ingest-bench-client",
            "--compression",
            "zstd",
            "streaming-ingestion",
            "--streams",
            "8",
            "--requests",
            "10",
            "--rows",
            "100",
            "--columns",
            "5",
        ]);
        let config = ClientConfig::try_from(args).unwrap();
        assert_eq!(config.compression, Compression::Zstd);

        let Scenario::StreamingIngestion(run) = config.scenario else {
            panic!("expected streaming ingestion");
        };
        assert_eq!(
            run.plan,
            IngestionPlan {
                streams: 8,
                requests_per_stream: 10,
                rows: 100,
                columns: 5,
            }
        );
        assert_eq!(run.plan.values_per_frame(), 500);
        assert_eq!(run.run_timeout, DEFAULT_RUN_TIMEOUT);
    }

    #[test]
    fn rejects_zero_streams() {
        let args = CliArgs::parse_from([
            "ingest-bench-client",
            "streaming-ingestion",
            "--streams",
            "0",
        ]);
        assert!(ClientConfig::try_from(args).is_err());
    }

    #[test]
    fn compression_maps_to_encoding() {
        assert_eq!(Option::<CompressionEncoding>::from(Compression::None), None);
        assert_eq!(
            Option::<CompressionEncoding>::from(Compression::Gzip),
            Some(CompressionEncoding::Gzip)
        );
        assert_eq!(Compression::Deflate.to_string(), "deflate");
    }
}
