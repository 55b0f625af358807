//! Outbound sinks.
//!
//! The session only knows how to push one event at a time to an
//! [`OutboundSink`]. The production sink, [`ChannelSink`], encodes the event
//! into its protobuf form and forwards it over the bounded channel backing the
//! gRPC response stream.

use core::future::Future;
use streamer_core::{Error, Result, event::Event, proto};
use tokio::sync::mpsc;
use tonic::Status;

/// Sender half of the channel that feeds a gRPC response stream.
pub type ResponseSender = mpsc::Sender<core::result::Result<proto::Event, Status>>;

/// Pushes events to the connected peer, strictly one at a time.
///
/// A failed send is final for the session: it is never retried.
pub trait OutboundSink: Send {
    fn send(&mut self, event: Event) -> impl Future<Output = Result<()>> + Send;
}

/// Sink writing into the response channel of a server-streaming call.
#[derive(Debug)]
pub struct ChannelSink {
    tx: ResponseSender,
}

impl ChannelSink {
    pub fn new(tx: ResponseSender) -> Self {
        Self { tx }
    }

    /// Best-effort delivery of a terminal error to the client.
    ///
    /// The peer may already be gone, in which case the failure is only logged.
    pub async fn fail(&self, err: Error) {
        if let Err(e) = self.tx.send(Err(err.into())).await {
            tracing::debug!("Response channel failed to forward error: {e}");
        }
    }
}

impl OutboundSink for ChannelSink {
    async fn send(&mut self, event: Event) -> Result<()> {
        let wire = proto::Event::try_from(event)?;
        self.tx
            .send(Ok(wire))
            .await
            .map_err(|e| Error::ChannelClosed {
                context: format!("Failed to forward event: {e}"),
            })
    }
}
