//! gRPC service and message definitions generated from
//! `proto/streamer.proto`.
//!
//! - [`streamer_server::Streamer`] - server trait with the `Subscribe`
//!   server-streaming method.
//! - [`streamer_client::StreamerClient`] - generated client.
//! - [`StreamRequest`] / [`Event`] - wire messages. `Event.payload` is a
//!   `google.protobuf.Struct`.

tonic::include_proto!("streamer");

/// Encoded `FileDescriptorSet` for the `streamer` package, registered with the
/// reflection service.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("streamer_descriptor");
