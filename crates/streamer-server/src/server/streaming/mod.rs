//! The server-streaming session lifecycle.
//!
//! A subscription is driven by a [`session::StreamSession`]: it waits for the
//! interval timer, asks its [`source::EventSource`] for the event at the
//! current step, pushes it through an [`sink::OutboundSink`] and repeats until
//! the source is exhausted, a send fails, or the call is cancelled.
//!
//! ## Submodules
//!
//! - [`session`] - the timed production-and-send loop and its outcomes.
//! - [`source`] - event sources (demo catalog, JSON-scripted catalogs).
//! - [`sink`] - outbound sinks, including the channel feeding the gRPC stream.
//! - [`tracker`] - live-session accounting used for timer release and drain.

pub mod session;
pub mod sink;
pub mod source;
pub mod tracker;
