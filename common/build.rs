// The coordinator service is described in Rust rather than in a `.proto`
// file, so no `protoc` is needed at build time. Message types live in
// `src/rpc.rs` and are encoded with prost.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let method = |name: &str, route: &str, input: &str, output: &str| {
        tonic_build::manual::Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::rpc::{input}"))
            .output_type(format!("crate::rpc::{output}"))
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let coordinator = tonic_build::manual::Service::builder()
        .name("Coordinator")
        .package("mapreduce")
        .method(method("request_task", "RequestTask", "TaskRequest", "TaskReply"))
        .method(method("report_done", "ReportDone", "DoneReport", "Ack"))
        .method(method("report_failed", "ReportFailed", "FailureReport", "Ack"))
        .method(method("status", "Status", "StatusRequest", "StatusReply"))
        .build();

    tonic_build::manual::Builder::new().compile(&[coordinator]);
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
