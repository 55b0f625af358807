/// Builds the gRPC client and server code for the `streamer.proto` definition
/// using `tonic-prost-build`.
///
/// The generated modules land in the crate's `OUT_DIR`, together with an
/// encoded `FileDescriptorSet` (`streamer_descriptor.bin`) that the server
/// registers with the reflection service so tools such as `grpcurl` can
/// discover the `Streamer` service without a local copy of the proto.
///
/// `google.protobuf.Struct` is mapped onto `prost_types::Struct`, which is why
/// `prost-types` is a regular dependency of this crate.
///
/// Generated code is accessible via:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("streamer");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("streamer_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/streamer.proto"],
        &["proto"],
    )?;

    println!("cargo:rerun-if-changed=proto/streamer.proto");
    Ok(())
}
