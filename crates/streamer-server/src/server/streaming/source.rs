//! Event sources.
//!
//! An [`EventSource`] is a pure function of the step index: the session asks
//! for the event at step `0`, `1`, `2`, ... and stops at the first `None`.
//! Sources carry no per-session cursor, so a single source is shared by every
//! concurrent subscription.

use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use streamer_core::{Error, Result, event::Event};

/// Produces the event for a given zero-based step, or `None` once exhausted.
///
/// Implementations must be deterministic in `step`. Once `event_at(n)` returns
/// `None`, the session never asks for `n + 1`.
pub trait EventSource: Send + Sync {
    fn event_at(&self, step: u64) -> Option<Event>;
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn event_at(&self, step: u64) -> Option<Event> {
        (**self).event_at(step)
    }
}

/// Type-erased source shared across sessions.
pub type SharedSource = Arc<dyn EventSource>;

/// A finite, ordered list of events replayed identically to every subscriber.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    events: Arc<[Event]>,
}

impl ScriptedSource {
    /// Builds a source from `events`, rejecting duplicate event ids.
    pub fn new(events: Vec<Event>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(events.len());
        for event in &events {
            if !seen.insert(event.event_id.as_str()) {
                return Err(Error::InvalidConfig {
                    reason: format!("duplicate event id `{}`", event.event_id),
                });
            }
        }
        Ok(Self {
            events: events.into(),
        })
    }

    /// Parses a JSON array of `{"event_id", "type", "payload"}` objects.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let events: Vec<Event> =
            serde_json::from_reader(reader).map_err(|e| Error::InvalidConfig {
                reason: format!("invalid events catalog: {e}"),
            })?;
        Self::new(events)
    }

    /// Loads a catalog from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::InvalidConfig {
            reason: format!("cannot open events file {}: {e}", path.display()),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for ScriptedSource {
    fn event_at(&self, step: u64) -> Option<Event> {
        usize::try_from(step)
            .ok()
            .and_then(|idx| self.events.get(idx))
            .cloned()
    }
}

/// The built-in catalog served when no events file is configured: a login, an
/// order and a ping.
pub fn demo_catalog() -> ScriptedSource {
    let events = vec![
        Event::new(
            "evt-001",
            "USER_LOGIN",
            payload(json!({"user_id": "usr_123", "status": "active"})),
        ),
        Event::new(
            "evt-002",
            "ORDER_CREATED",
            payload(json!({"order_id": "ord_abc_987", "value": 99.95})),
        ),
        Event::new(
            "evt-003",
            "SYSTEM_PING",
            payload(json!({"latency_ms": 50})),
        ),
    ];
    ScriptedSource {
        events: events.into(),
    }
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
