//! Error types shared by the benchmark client and server.
//!
//! This module defines the central `Error` enum. It implements
//! `From<Error>` for `tonic::Status` so server-side failures propagate to
//! clients with an appropriate status code.
//!
//! ## Error Cases
//! - `ChannelError`: An internal communication failure between tasks.
//! - `InvalidRequest`: The request was malformed or exceeded bounds.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.
//! - `Rpc`: A gRPC call or stream terminated with a non-OK status.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the ingestion benchmark.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A call or stream ended with an error status.
    #[error("RPC failed: {0}")]
    Rpc(#[from] Status),
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::Rpc(status) => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let status: Status = Error::InvalidRequest {
            reason: "count must be >= 0".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "count must be >= 0");

        let status: Status = Error::ServiceShutdown.into();
        assert_eq!(status.code(), Code::Unavailable);

        let status: Status = Error::Rpc(Status::cancelled("gone")).into();
        assert_eq!(status.code(), Code::Cancelled);

        let status: Status = Error::ChannelError {
            context: "closed".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::Internal);
    }
}
