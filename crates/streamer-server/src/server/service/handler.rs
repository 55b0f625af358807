//! gRPC service implementation for paced event subscriptions.
//!
//! This module defines [`StreamerService`], the concrete implementation of the
//! [`Streamer`] gRPC service. Each `Subscribe` call gets its own
//! [`StreamSession`] run on a dedicated task, an outbound [`ChannelSink`]
//! feeding the response stream, and a cancellation token that fires when the
//! client goes away or the server shuts down.
//!
//! ## Responsibilities
//!
//! - Refuse new subscriptions once shutdown has begun.
//! - Wire each call's sink and cancellation token to a session.
//! - Report the session outcome: logs, metrics, and the terminal status seen by
//!   the client.
//! - Drain, then cancel, in-flight sessions during graceful shutdown.

use crate::server::{
    config::ServerConfig,
    streaming::{
        session::{SessionOutcome, StreamSession},
        sink::{ChannelSink, ResponseSender},
        source::SharedSource,
        tracker::SessionTracker,
    },
    telemetry::{
        decrement_sessions_inflight, increment_events_sent, increment_session_cancellations,
        increment_session_errors, increment_sessions_inflight, increment_subscriptions,
        record_session_duration,
    },
};
use core::{pin::Pin, time::Duration};
use futures::TryStreamExt;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streamer_core::{
    Error,
    event::SubscriptionRequest,
    proto::{Event, StreamRequest, streamer_server::Streamer},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// How long cancelled sessions get to acknowledge during shutdown.
const CANCEL_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// gRPC service pushing paced event streams to subscribers.
///
/// Cloning is cheap: clones share the session driver, the live-session
/// tracker and the shutdown state.
#[derive(Clone)]
pub struct StreamerService {
    config: ServerConfig,
    session: Arc<StreamSession<SharedSource>>,
    tracker: SessionTracker,
    shutdown_token: CancellationToken,
    refusing: Arc<AtomicBool>,
}

impl StreamerService {
    /// Creates the service around `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configured interval is zero.
    pub fn new(config: ServerConfig, source: SharedSource) -> Result<Self, Error> {
        let tracker = SessionTracker::new();
        let session = StreamSession::new(source, config.interval, tracker.clone())?
            .with_exhaustion(config.exhaustion);

        Ok(Self {
            config,
            session: Arc::new(session),
            tracker,
            shutdown_token: CancellationToken::new(),
            refusing: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.tracker.active()
    }

    /// Gracefully shuts the service down.
    ///
    /// - Refuses new subscriptions.
    /// - Waits up to `shutdown_timeout` for in-flight sessions to finish.
    /// - Cancels whatever is left and waits for those sessions to stop.
    pub async fn shutdown(&self) -> Result<(), Error> {
        tracing::info!("Refusing new subscriptions");
        self.refusing.store(true, Ordering::Release);

        tracing::info!(
            "Draining in-flight sessions ({} active)",
            self.active_sessions()
        );
        if self.tracker.drain(self.config.shutdown_timeout).await {
            tracing::debug!("All in-flight sessions drained");
        } else {
            tracing::warn!(
                "Graceful drain timed out ({} sessions still active)",
                self.active_sessions()
            );
        }

        tracing::debug!("Cancelling remaining sessions via shutdown token");
        self.shutdown_token.cancel();

        if !self.tracker.drain(CANCEL_ACK_TIMEOUT).await {
            tracing::error!(
                "{} sessions did not stop after cancellation",
                self.active_sessions()
            );
        }

        tracing::info!("Streamer service shutdown complete");
        Ok(())
    }
}

/// Cancels `cancel` once the client drops its end of the response stream.
async fn cancel_on_disconnect(tx: ResponseSender, cancel: CancellationToken) {
    tokio::select! {
        () = tx.closed() => cancel.cancel(),
        () = cancel.cancelled() => {}
    }
}

#[tonic::async_trait]
impl Streamer for StreamerService {
    type SubscribeStream = Pin<Box<dyn Stream<Item = Result<Event, Status>> + Send>>;

    /// Opens a paced subscription for the requesting client.
    ///
    /// The session runs on its own task and the response stream ends when it
    /// terminates: cleanly on completion or cancellation, with an error status
    /// on send failure or when cut short by shutdown.
    #[tracing::instrument(skip_all, fields(client_id = %req.get_ref().client_id))]
    async fn subscribe(
        &self,
        req: Request<StreamRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        if self.refusing.load(Ordering::Acquire) {
            increment_session_errors();
            return Err(Error::ServiceShutdown.into());
        }

        let request = SubscriptionRequest::from(req.into_inner());
        tracing::info!(
            "Received subscription request from client ID: {}",
            request.client_id
        );

        increment_subscriptions();
        increment_sessions_inflight();
        let start = std::time::Instant::now();

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let cancel = self.shutdown_token.child_token();
        tokio::spawn(cancel_on_disconnect(resp_tx.clone(), cancel.clone()));

        let session = Arc::clone(&self.session);
        let shutdown_token = self.shutdown_token.clone();
        let span = tracing::info_span!("session", client_id = %request.client_id);

        let fut = async move {
            // Stops the disconnect watcher once the session is over.
            let _watcher_guard = cancel.clone().drop_guard();
            let mut sink = ChannelSink::new(resp_tx);

            let outcome = session.run(&request, &mut sink, &cancel).await;
            tracing::debug!(sent = outcome.sent(), "Session terminated");

            match outcome {
                SessionOutcome::Completed { sent } => {
                    tracing::info!(sent, "Finished sending events, closing stream");
                }
                SessionOutcome::Cancelled { sent } => {
                    increment_session_cancellations();
                    if shutdown_token.is_cancelled() {
                        tracing::info!(sent, "Session cancelled by server shutdown");
                        sink.fail(Error::ServiceShutdown).await;
                    } else {
                        tracing::info!(sent, "Client disconnected");
                    }
                }
                SessionOutcome::SendFailed { sent, error } => {
                    increment_session_errors();
                    tracing::warn!(sent, "Error sending event to client: {error}");
                    sink.fail(error).await;
                }
            }

            decrement_sessions_inflight();
            record_session_duration(start.elapsed().as_secs_f64() * 1000.0);
        };

        tokio::spawn(fut.instrument(span));

        let stream = ReceiverStream::new(resp_rx).inspect_ok(|_event| increment_events_sent());

        Ok(Response::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::streaming::{
        session::ExhaustionPolicy,
        source::{ScriptedSource, demo_catalog},
    };
    use serde_json::Map;
    use std::net::SocketAddr;
    use streamer_core::proto::streamer_client::StreamerClient;
    use streamer_core::proto::streamer_server::StreamerServer;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::Code;
    use tonic::transport::{Channel, Server};

    fn config(interval: Duration) -> ServerConfig {
        ServerConfig {
            server_addr: "127.0.0.1:0".to_string(),
            interval,
            exhaustion: ExhaustionPolicy::Paced,
            events_file: None,
            stream_buffer_size: 1,
            shutdown_timeout: Duration::from_millis(200),
        }
    }

    /// Serves `service` on a loopback port until `stop` is cancelled.
    async fn spawn_server(
        service: StreamerService,
        stop: CancellationToken,
    ) -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(StreamerServer::new(service))
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    stop.cancelled_owned(),
                )
                .await
                .expect("server");
        });
        (addr, handle)
    }

    async fn connect(addr: SocketAddr) -> StreamerClient<Channel> {
        StreamerClient::connect(format!("http://{addr}"))
            .await
            .expect("connect")
    }

    async fn wait_for_idle(service: &StreamerService) {
        timeout(Duration::from_secs(5), async {
            while service.active_sessions() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sessions did not finish");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn streams_the_demo_catalog_in_order() {
        let service =
            StreamerService::new(config(Duration::from_millis(20)), Arc::new(demo_catalog()))
                .expect("service");
        let stop = CancellationToken::new();
        let (addr, server) = spawn_server(service.clone(), stop.clone()).await;

        let mut client = connect(addr).await;
        let mut stream = client
            .subscribe(StreamRequest {
                client_id: "it-client".to_string(),
            })
            .await
            .expect("subscribe")
            .into_inner();

        let mut received = Vec::new();
        while let Some(event) = stream.message().await.expect("clean stream") {
            received.push((event.event_id, event.r#type));
        }

        assert_eq!(
            received,
            vec![
                ("evt-001".to_string(), "USER_LOGIN".to_string()),
                ("evt-002".to_string(), "ORDER_CREATED".to_string()),
                ("evt-003".to_string(), "SYSTEM_PING".to_string()),
            ]
        );

        wait_for_idle(&service).await;
        drop(client);
        stop.cancel();
        server.await.expect("server task");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn client_disconnect_cancels_the_session() {
        let events = (0..1000)
            .map(|i| streamer_core::event::Event::new(format!("e{i}"), "TICK", Map::new()))
            .collect();
        let source = ScriptedSource::new(events).expect("unique ids");
        let service = StreamerService::new(config(Duration::from_millis(10)), Arc::new(source))
            .expect("service");
        let stop = CancellationToken::new();
        let (addr, server) = spawn_server(service.clone(), stop.clone()).await;

        let mut client = connect(addr).await;
        let mut stream = client
            .subscribe(StreamRequest {
                client_id: "quitter".to_string(),
            })
            .await
            .expect("subscribe")
            .into_inner();

        let first = stream.message().await.expect("ok").expect("one event");
        assert_eq!(first.event_id, "e0");
        assert_eq!(service.active_sessions(), 1);

        drop(stream);
        drop(client);
        wait_for_idle(&service).await;

        stop.cancel();
        server.await.expect("server task");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_sessions_and_refuses_new_calls() {
        let events = (0..1000)
            .map(|i| streamer_core::event::Event::new(format!("e{i}"), "TICK", Map::new()))
            .collect();
        let source = ScriptedSource::new(events).expect("unique ids");
        let service = StreamerService::new(config(Duration::from_millis(10)), Arc::new(source))
            .expect("service");
        let stop = CancellationToken::new();
        let (addr, server) = spawn_server(service.clone(), stop.clone()).await;

        let mut client = connect(addr).await;
        let mut stream = client
            .subscribe(StreamRequest {
                client_id: "long-lived".to_string(),
            })
            .await
            .expect("subscribe")
            .into_inner();
        stream.message().await.expect("ok").expect("one event");

        service.shutdown().await.expect("shutdown");
        assert_eq!(service.active_sessions(), 0);

        // Drain whatever was buffered; the stream must end with `unavailable`.
        let status = loop {
            match stream.message().await {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("stream closed without a shutdown status"),
                Err(status) => break status,
            }
        };
        assert_eq!(status.code(), Code::Unavailable);

        let Err(refused) = client
            .subscribe(StreamRequest {
                client_id: "late".to_string(),
            })
            .await
        else {
            panic!("subscription accepted during shutdown");
        };
        assert_eq!(refused.code(), Code::Unavailable);

        drop(stream);
        drop(client);
        stop.cancel();
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let result = StreamerService::new(config(Duration::ZERO), Arc::new(demo_catalog()));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
}
