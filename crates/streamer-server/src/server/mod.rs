//! Server-side components of the `streamer` event service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration and validation.
//! - [`service`] - the `Streamer` gRPC service and shutdown coordination.
//! - [`streaming`] - the session lifecycle: sources, sinks, pacing and
//!   cancellation.
//! - [`telemetry`] - logging and optional OpenTelemetry export.

pub mod config;
pub mod service;
pub mod streaming;
pub mod telemetry;
