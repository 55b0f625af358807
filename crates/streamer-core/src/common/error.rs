//! Error types for the event streaming service.
//!
//! This module defines the central `Error` enum shared by the streaming
//! session, the gRPC service and the binaries. It implements
//! `From<Error>` for `tonic::Status` so failures surface to clients with an
//! appropriate status code.
//!
//! ## Error Cases
//! - `ChannelClosed`: The outbound stream towards the client is gone.
//! - `Encode`: An event payload cannot be represented on the wire.
//! - `InvalidConfig`: Runtime or session configuration was rejected.
//! - `ServiceShutdown`: The service is shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the event streaming service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The outbound channel to the client was closed (peer went away).
    #[error("Channel closed: {context}")]
    ChannelClosed { context: String },

    /// An event could not be converted to or from its wire representation.
    #[error("Encode error: {reason}")]
    Encode { reason: String },

    /// A configuration value or session parameter was rejected.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelClosed { context } => {
                Status::internal(format!("Channel closed: {context}"))
            }
            Error::Encode { reason } => Status::internal(format!("Encode error: {reason}")),
            Error::InvalidConfig { reason } => Status::failed_precondition(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
