use anyhow::bail;
use clap::Parser;

/// Runtime configuration for the `ingest-bench-server` binary.
///
/// These settings control buffering, message limits and shutdown behavior of
/// the benchmark service. All values are parsed from CLI arguments or
/// environment variables (optionally loaded from a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ingest-bench-server",
    version,
    about = "A gRPC server that validates and acknowledges streamed data frames"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/ingest-bench.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, env = "UDS", default_value_t = false)]
    pub uds: bool,

    /// Capacity of the ack buffer between a call's receive task and its
    /// response stream.
    ///
    /// When the client stops reading acks, the receive task stalls once this
    /// many acks are queued, which in turn applies backpressure to the
    /// client's sends.
    ///
    /// Environment variable: `ACK_BUFFER_SIZE`
    #[arg(long, env = "ACK_BUFFER_SIZE", default_value_t = 64)]
    pub ack_buffer_size: usize,

    /// Largest inbound message accepted, in bytes.
    ///
    /// A 1000 x 250 frame encodes to roughly 2.8 MB, so the default leaves
    /// headroom above tonic's 4 MiB default.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_message_bytes: usize,

    /// Upper bound on `n` for `StreamingSpam`.
    ///
    /// Environment variable: `MAX_SPAM_COUNT`
    #[arg(long, env = "MAX_SPAM_COUNT", default_value_t = 1_000_000_000)]
    pub max_spam_count: i64,

    /// Seconds to wait for in-flight streams to drain on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub ack_buffer_size: usize,
    pub max_message_bytes: usize,
    pub max_spam_count: i64,
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
            ack_buffer_size: 64,
            max_message_bytes: 16 * 1024 * 1024,
            max_spam_count: 1_000_000_000,
            shutdown_timeout: 30,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.ack_buffer_size == 0 {
            bail!("ACK_BUFFER_SIZE must be greater than 0");
        }

        if args.max_message_bytes == 0 {
            bail!("MAX_MESSAGE_BYTES must be greater than 0");
        }

        if args.max_spam_count < 0 {
            bail!(
                "MAX_SPAM_COUNT ({}) must not be negative",
                args.max_spam_count
            );
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            ack_buffer_size: args.ack_buffer_size,
            max_message_bytes: args.max_message_bytes,
            max_spam_count: args.max_spam_count,
            shutdown_timeout: args.shutdown_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let args = CliArgs::parse_from(["ingest-bench-server"]);
        let config = ServerConfig::try_from(args).unwrap();
        let defaults = ServerConfig::default();

        assert_eq!(config.ack_buffer_size, defaults.ack_buffer_size);
        assert_eq!(config.max_message_bytes, defaults.max_message_bytes);
        assert_eq!(config.max_spam_count, defaults.max_spam_count);
        assert_eq!(config.shutdown_timeout, defaults.shutdown_timeout);
    }

    #[test]
    fn rejects_zero_ack_buffer() {
        let args = CliArgs::parse_from(["ingest-bench-server", "--ack-buffer-size", "0"]);
        assert!(ServerConfig::try_from(args).is_err());
    }
}
