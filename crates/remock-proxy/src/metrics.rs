//! Operational metrics derived from server events.
//!
//! The aggregator is a pure event sink: it subscribes to an [`EventBus`] and
//! maintains per-project counters in process memory. `server-started` events
//! append to the start history, `request-received` events increment the
//! request total, and `server-stopped` events are explicitly ignored.

use crate::events::{EventBus, ServerEvent, ServerStartedEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Point-in-time view of the aggregated metrics. Returned by value; mutating
/// a snapshot never affects subsequent aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Start history per project, one entry per `server-started` event,
    /// append-only and ordered.
    pub starts: HashMap<String, Vec<ServerStartedEvent>>,
    /// Total `request-received` events per project.
    pub total_requests: HashMap<String, u64>,
}

/// Event-sink aggregator with in-memory state and no external I/O.
#[derive(Default)]
pub struct MetricsAggregator {
    state: Mutex<MetricsSnapshot>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this aggregator to a bus. One aggregator may observe several
    /// servers sharing a bus; events disambiguate by project.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let aggregator = Arc::clone(self);
        bus.subscribe(move |event| aggregator.observe(event));
    }

    /// Fold one event into the aggregate state.
    pub fn observe(&self, event: &ServerEvent) {
        let mut state = self.state.lock();
        match event {
            ServerEvent::Started(started) => {
                state
                    .starts
                    .entry(started.project.clone())
                    .or_default()
                    .push(started.clone());
            }
            ServerEvent::Stopped(_) => {}
            ServerEvent::RequestReceived(received) => {
                *state.total_requests.entry(received.project.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Current metrics as an owned deep copy.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().clone()
    }
}
