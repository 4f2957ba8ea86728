//! Event system for async message handling.
//!
//! Device-originated messages reach the application two ways: through the
//! hooks of a [`DeviceEventListener`] installed on the session, and as
//! [`Event`]s broadcast to every [`Subscription`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::protocol::DeviceMessage;

/// Hooks invoked by the dispatch loop.
///
/// All hooks default to doing nothing; override the ones you need. Hooks
/// run on the dispatch task, so they should return quickly.
pub trait DeviceEventListener: Send + Sync {
    /// The device reported `DONE`; `payload` is the text after the tag.
    fn on_done(&self, payload: &str) {
        let _ = payload;
    }

    /// The photoresistor crossed its threshold (`PHOTO-HIGH`).
    fn on_sensor_activated(&self, payload: &str) {
        let _ = payload;
    }

    /// A photoresistor reading arrived (`PHOTO-DATA`).
    fn on_sensor_data(&self, value: &str) {
        let _ = value;
    }
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl DeviceEventListener for NoopListener {}

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Handshake succeeded on the given endpoint.
    Connected { endpoint: String },
    /// Session was closed.
    Disconnected,
    /// Completion event from the device.
    Done { payload: String },
    /// Photoresistor activation.
    SensorActivated { payload: String },
    /// Photoresistor reading.
    SensorData { value: String },
}

/// Discriminant of an [`Event`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Done,
    SensorActivated,
    SensorData,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Done { .. } => EventKind::Done,
            Self::SensorActivated { .. } => EventKind::SensorActivated,
            Self::SensorData { .. } => EventKind::SensorData,
        }
    }
}

impl From<DeviceMessage> for Event {
    fn from(msg: DeviceMessage) -> Self {
        match msg {
            DeviceMessage::Done { payload } => Self::Done { payload },
            DeviceMessage::SensorActivated { payload } => Self::SensorActivated { payload },
            DeviceMessage::SensorData { value } => Self::SensorData { value },
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscription lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted kinds; `None` accepts everything.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    /// Creates a filter for a single event kind.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self::kinds(vec![kind])
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let subscription = self.subscribe();
        wait_on(subscription, filter, timeout).await
    }
}

/// Waits on an existing subscription for a matching event.
///
/// Subscribe before triggering the device, then wait here; events
/// dispatched in between are not lost.
pub async fn wait_on(
    mut subscription: Subscription,
    filter: EventFilter,
    timeout: Duration,
) -> Option<Event> {
    tokio::select! {
        biased;
        result = async {
            while let Some(event) = subscription.recv().await {
                if filter.matches(&event) {
                    return Some(event);
                }
            }
            None
        } => result,
        () = tokio::time::sleep(timeout) => None,
    }
}
