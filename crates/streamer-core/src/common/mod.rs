//! Shared types and error definitions used by the `streamer` server and
//! client.
//!
//! ## Submodules
//!
//! - [`error`] - Centralized error type and its `tonic::Status` mapping.
//! - [`event`] - Domain event and subscription types plus wire conversions.
//! - [`proto`] - Generated protobuf messages and gRPC bindings.

pub mod error;
pub mod event;
pub mod proto;

pub use error::{Error, Result};
