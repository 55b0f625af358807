//! gRPC service implementation.
//!
//! - [`handler`] - `Streamer` service entry point (`StreamerService`).

pub mod handler;
