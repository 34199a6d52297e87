//! In-process server event bus.
//!
//! A small typed publish/subscribe channel carrying the proxy's lifecycle and
//! traffic events. Each running server owns (or shares) one bus instance,
//! injected into collaborators; there is no global emitter. Delivery is
//! synchronous: `publish` invokes every listener registered before the call,
//! in registration order, on the calling task, before it returns.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Emitted once the listening socket is bound and the proxy accepts traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStartedEvent {
    pub timestamp: DateTime<Utc>,
    pub port: u16,
    pub bind_address: String,
    pub project: String,
}

/// Emitted after the listening socket has closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStoppedEvent {
    pub timestamp: DateTime<Utc>,
    pub project: String,
}

/// Emitted after a proxied request/response cycle has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReceivedEvent {
    pub timestamp: DateTime<Utc>,
    pub project: String,
}

/// The closed set of event kinds carried by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Started(ServerStartedEvent),
    Stopped(ServerStoppedEvent),
    RequestReceived(RequestReceivedEvent),
}

impl ServerEvent {
    /// Project the event belongs to; disambiguates events when several
    /// servers share one bus.
    pub fn project(&self) -> &str {
        match self {
            ServerEvent::Started(event) => &event.project,
            ServerEvent::Stopped(event) => &event.project,
            ServerEvent::RequestReceived(event) => &event.project,
        }
    }
}

type Listener = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// Typed publish/subscribe bus for [`ServerEvent`]s.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all event kinds. Listeners registered after a
    /// `publish` call do not see that event.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    /// Deliver an event to every registered listener, in registration order,
    /// before returning.
    pub fn publish(&self, event: &ServerEvent) {
        for listener in self.listeners.read().iter() {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn request_received(project: &str) -> ServerEvent {
        ServerEvent::RequestReceived(RequestReceivedEvent {
            timestamp: Utc::now(),
            project: project.to_string(),
        })
    }

    #[test]
    fn delivers_to_listeners_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(move |_event| order.lock().unwrap().push(tag));
        }

        bus.publish(&request_received("p"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn delivery_is_synchronous() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_listener = Arc::clone(&seen);
        bus.subscribe(move |_event| {
            seen_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&request_received("p"));
        // The listener ran before publish returned.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::new();
        bus.publish(&request_received("p"));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_listener = Arc::clone(&seen);
        bus.subscribe(move |_event| {
            seen_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        bus.publish(&request_received("p"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_project_accessor_covers_all_kinds() {
        let started = ServerEvent::Started(ServerStartedEvent {
            timestamp: Utc::now(),
            port: 4000,
            bind_address: "127.0.0.1".to_string(),
            project: "a".to_string(),
        });
        let stopped = ServerEvent::Stopped(ServerStoppedEvent {
            timestamp: Utc::now(),
            project: "b".to_string(),
        });
        assert_eq!(started.project(), "a");
        assert_eq!(stopped.project(), "b");
        assert_eq!(request_received("c").project(), "c");
    }
}
