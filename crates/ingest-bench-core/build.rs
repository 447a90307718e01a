/// Generates the gRPC client and server bindings for the `Benchmark` service.
///
/// The wire messages are hand-written `prost` structs in `src/proto.rs`, so the
/// service is described with `tonic_build::manual` instead of a `.proto` file.
/// This keeps the build free of a `protoc` dependency while producing the same
/// client/server code that `tonic-build` would emit for:
///
/// ```protobuf
/// package dp.benchmark;
///
/// service Benchmark {
///   rpc UnarySpam(Int64Msg) returns (Int64Msg);
///   rpc StreamingSpam(Int64Msg) returns (stream Int64Msg);
///   rpc UnaryIngestion(DataFrame) returns (SnapshotId);
///   rpc StreamingIngestion(stream DataFrame) returns (stream FrameAck);
/// }
/// ```
///
/// # Output
///
/// The generated file is `dp.benchmark.Benchmark.rs` in `OUT_DIR` and is
/// included by `src/proto.rs`. It exposes the `benchmark_client` and
/// `benchmark_server` modules.
///
/// # Panics
///
/// `tonic_build` panics if the generated code cannot be written.
use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

fn main() {
    let benchmark = Service::builder()
        .name("Benchmark")
        .package("dp.benchmark")
        .method(
            Method::builder()
                .name("unary_spam")
                .route_name("UnarySpam")
                .input_type("crate::proto::Int64Msg")
                .output_type("crate::proto::Int64Msg")
                .codec_path(CODEC)
                .build(),
        )
        .method(
            Method::builder()
                .name("streaming_spam")
                .route_name("StreamingSpam")
                .input_type("crate::proto::Int64Msg")
                .output_type("crate::proto::Int64Msg")
                .codec_path(CODEC)
                .server_streaming()
                .build(),
        )
        .method(
            Method::builder()
                .name("unary_ingestion")
                .route_name("UnaryIngestion")
                .input_type("crate::proto::DataFrame")
                .output_type("crate::proto::SnapshotId")
                .codec_path(CODEC)
                .build(),
        )
        .method(
            Method::builder()
                .name("streaming_ingestion")
                .route_name("StreamingIngestion")
                .input_type("crate::proto::DataFrame")
                .output_type("crate::proto::FrameAck")
                .codec_path(CODEC)
                .client_streaming()
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[benchmark]);
}
