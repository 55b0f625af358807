//! The timed production-and-send loop behind every subscription.
//!
//! A [`StreamSession`] runs a small state machine per call:
//!
//! ```text
//!            tick                 Some(event)            Ok
//! Waiting ---------> Producing -------------> Sending ------> Waiting (step + 1)
//!    |                   |                       |
//!    | cancelled         | None                  | Err
//!    v                   v                       v
//! Cancelled          Completed               SendFailed
//! ```
//!
//! ## Pacing
//!
//! - The first tick fires one full interval after the session starts. There is
//!   no eager first event.
//! - Ticks missed because a send was slow are not caught up. At most one late
//!   tick is delivered immediately, then the schedule snaps back to the next
//!   multiple of the interval.
//! - With [`ExhaustionPolicy::Paced`] the session waits one more interval
//!   before it learns the source is exhausted, even when the source is empty.
//!
//! ## Cancellation
//!
//! The timer and the cancellation token are raced while `Waiting`. If both are
//! ready at once, cancellation wins so nothing is sent to a departed peer.
//! Cancellation is not observed mid-send: a send in progress completes first.
//!
//! ## Resources
//!
//! The interval timer and the session's [`SessionLease`] live in one value
//! that is dropped on every exit path.

use super::{
    sink::OutboundSink,
    source::EventSource,
    tracker::{SessionLease, SessionTracker},
};
use core::time::Duration;
use streamer_core::{Error, Result, event::SubscriptionRequest};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// When a session notices that its source has run dry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Discover exhaustion on the tick after the last event, one full
    /// interval after the final send.
    #[default]
    Paced,
    /// Complete right after the last successful send, or immediately when the
    /// source has no events at all.
    Immediate,
}

/// Terminal result of a session. Produced exactly once per run.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The source was exhausted and every event was delivered.
    Completed { sent: u64 },
    /// The sink rejected an event. `error` is the sink's original error.
    SendFailed { sent: u64, error: Error },
    /// The call was cancelled while waiting for the next tick.
    Cancelled { sent: u64 },
}

impl SessionOutcome {
    /// Number of events successfully delivered before termination.
    pub const fn sent(&self) -> u64 {
        match self {
            Self::Completed { sent } | Self::SendFailed { sent, .. } | Self::Cancelled { sent } => {
                *sent
            }
        }
    }
}

/// Interval timer bundled with the session's lease.
struct Pacer {
    interval: Interval,
    _lease: SessionLease,
}

impl Pacer {
    fn start(period: Duration, lease: SessionLease) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            _lease: lease,
        }
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Drives subscriptions against a shared [`EventSource`].
///
/// A single `StreamSession` can run any number of calls concurrently: all
/// per-call state (timer, step index, outcome) lives inside [`run`].
///
/// [`run`]: StreamSession::run
#[derive(Debug)]
pub struct StreamSession<S> {
    source: S,
    interval: Duration,
    exhaustion: ExhaustionPolicy,
    tracker: SessionTracker,
}

impl<S: EventSource> StreamSession<S> {
    /// Creates a session driver emitting one event per `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `interval` is zero.
    pub fn new(source: S, interval: Duration, tracker: SessionTracker) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "stream interval must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            source,
            interval,
            exhaustion: ExhaustionPolicy::default(),
            tracker,
        })
    }

    #[must_use]
    pub const fn with_exhaustion(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Runs one subscription to completion.
    ///
    /// Events are produced from step `0` upwards and handed to `sink` in order,
    /// one per tick. Returns when the source is exhausted, a send fails, or
    /// `cancel` fires while waiting for the next tick.
    pub async fn run<K: OutboundSink>(
        &self,
        request: &SubscriptionRequest,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        let mut pacer = Pacer::start(self.interval, self.tracker.lease());
        let mut step: u64 = 0;

        if self.exhaustion == ExhaustionPolicy::Immediate && self.source.event_at(0).is_none() {
            if cancel.is_cancelled() {
                return SessionOutcome::Cancelled { sent: 0 };
            }
            return SessionOutcome::Completed { sent: 0 };
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(client_id = %request.client_id, step, "Session cancelled while waiting");
                    return SessionOutcome::Cancelled { sent: step };
                }
                () = pacer.tick() => {}
            }

            let Some(event) = self.source.event_at(step) else {
                return SessionOutcome::Completed { sent: step };
            };

            tracing::info!(event_id = %event.event_id, "Sending event: {}", event.kind);
            if let Err(error) = sink.send(event).await {
                return SessionOutcome::SendFailed { sent: step, error };
            }
            step += 1;

            if self.exhaustion == ExhaustionPolicy::Immediate
                && self.source.event_at(step).is_none()
            {
                return SessionOutcome::Completed { sent: step };
            }
        }
    }
}
