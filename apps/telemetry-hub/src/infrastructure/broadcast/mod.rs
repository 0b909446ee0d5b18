//! Broadcast Hub
//!
//! Fans readings and alerts out to every live subscriber.
//!
//! # Architecture
//!
//! Each subscriber owns a bounded `mpsc` channel. The hub keeps only the
//! sending halves in a registry keyed by [`SubscriptionId`]. Publishing:
//!
//! 1. copies the current senders out from under the registry lock,
//! 2. releases the lock,
//! 3. `try_send`s the event to each subscriber.
//!
//! `try_send` never waits, so a stalled subscriber cannot hold up the
//! publisher or anyone else. A subscriber whose channel is closed (it went
//! away) or full (it stopped draining) is unregistered on the spot.
//!
//! Each subscriber sees events in the order they were published; the
//! transport drains its channel from a dedicated task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::BroadcastSettings;
use crate::application::ports::TelemetryPublisher;
use crate::domain::alert::Alert;
use crate::domain::reading::Reading;
use crate::infrastructure::metrics::{self, EventKind};

// =============================================================================
// Hub Events
// =============================================================================

/// An event pushed to subscribers.
///
/// Serializes as `{"event": "<name>", "data": {...}}` where the event names
/// are the ones dashboard clients listen for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum HubEvent {
    /// A newly ingested reading.
    #[serde(rename = "ReceiveEnergyUpdate")]
    Reading(Reading),
    /// A threshold alert.
    #[serde(rename = "ReceiveAlert")]
    Alert(Alert),
}

impl HubEvent {
    /// Metric label for this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Reading(_) => EventKind::Reading,
            Self::Alert(_) => EventKind::Alert,
        }
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Receiving side of a registered subscriber.
///
/// Dropping it closes the channel; the hub notices on the next publish and
/// unregisters the id.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::Receiver<HubEvent>,
}

impl Subscription {
    /// The handle to pass to [`BroadcastHub::unregister`].
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the hub has dropped this subscriber and the
    /// buffered events are drained.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.events.recv().await
    }

    /// Take an already-buffered event without waiting.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.events.try_recv().ok()
    }
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Largest per-subscriber queue depth the hub will allocate.
pub const MAX_SUBSCRIBER_BUFFER: usize = 65_536;

/// Configuration for the broadcast hub.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Events buffered per subscriber before it is considered unresponsive.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            subscriber_buffer: settings.subscriber_buffer,
        }
    }
}

/// Registry of live subscribers and the fan-out over them.
///
/// # Example
///
/// ```rust
/// use telemetry_hub::infrastructure::broadcast::{BroadcastHub, HubEvent};
/// use telemetry_hub::application::ports::TelemetryPublisher;
/// use telemetry_hub::domain::reading::Reading;
///
/// let hub = BroadcastHub::with_defaults();
/// let mut subscription = hub.subscribe();
///
/// hub.publish_reading(Reading::now("Fridge001", 80.0));
///
/// assert!(matches!(subscription.try_recv(), Some(HubEvent::Reading(_))));
/// ```
#[derive(Debug)]
pub struct BroadcastHub {
    config: BroadcastConfig,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::Sender<HubEvent>>>,
    published: AtomicU64,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

impl BroadcastHub {
    /// Create a new broadcast hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config: BroadcastConfig {
                subscriber_buffer: config.subscriber_buffer.clamp(1, MAX_SUBSCRIBER_BUFFER),
            },
            subscribers: Mutex::new(HashMap::new()),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Create a new broadcast hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Add an externally created sender to the live set.
    pub fn register(&self, sender: mpsc::Sender<HubEvent>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };

        metrics::set_subscribers(count);
        tracing::debug!(subscription_id = %id, subscribers = count, "Subscriber registered");
        id
    }

    /// Create a channel sized by the configuration and register it.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let id = self.register(tx);
        Subscription { id, events: rx }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriptionId) {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            metrics::set_subscribers(count);
            tracing::debug!(subscription_id = %id, subscribers = count, "Subscriber unregistered");
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver an event to every registered subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: &HubEvent) -> usize {
        let targets: Vec<(SubscriptionId, mpsc::Sender<HubEvent>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        self.published.fetch_add(1, Ordering::Relaxed);
        metrics::record_event_published(event.kind());

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscription_id = %id,
                        buffer = self.config.subscriber_buffer,
                        "Subscriber not draining, dropping it"
                    );
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscription_id = %id, "Subscriber channel closed");
                    failed.push(id);
                }
            }
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        metrics::record_events_delivered(event.kind(), delivered as u64);

        if !failed.is_empty() {
            self.evict(&failed);
        }

        delivered
    }

    fn evict(&self, ids: &[SubscriptionId]) {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock();
            let removed = ids
                .iter()
                .filter(|id| subscribers.remove(*id).is_some())
                .count();
            (removed, subscribers.len())
        };

        if removed > 0 {
            self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::record_subscribers_evicted(removed as u64);
            metrics::set_subscribers(count);
        }
    }

    /// Get statistics about the hub.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            events_published: self.published.load(Ordering::Relaxed),
            events_delivered: self.delivered.load(Ordering::Relaxed),
            subscribers_evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

impl TelemetryPublisher for BroadcastHub {
    fn publish_reading(&self, reading: Reading) {
        self.publish(&HubEvent::Reading(reading));
    }

    fn publish_alert(&self, alert: Alert) {
        self.publish(&HubEvent::Alert(alert));
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Statistics about the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Events published since startup.
    pub events_published: u64,
    /// Individual subscriber deliveries since startup.
    pub events_delivered: u64,
    /// Subscribers dropped after a failed delivery.
    pub subscribers_evicted: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::AlertEvaluator;

    fn reading(watts: f64) -> Reading {
        Reading::now("Fridge001", watts)
    }

    #[test]
    fn broadcast_hub_creation() {
        let hub = BroadcastHub::with_defaults();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.stats(), BroadcastStats::default());
    }

    #[test]
    fn subscribe_and_unregister() {
        let hub = BroadcastHub::with_defaults();

        let s1 = hub.subscribe();
        let _s2 = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.unregister(s1.id());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let hub = BroadcastHub::with_defaults();
        let s1 = hub.subscribe();
        let _s2 = hub.subscribe();

        hub.unregister(s1.id());
        hub.unregister(s1.id());

        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn send_and_receive_reading() {
        let hub = BroadcastHub::with_defaults();
        let mut sub = hub.subscribe();

        hub.publish_reading(reading(80.0));

        match sub.recv().await.unwrap() {
            HubEvent::Reading(r) => assert_eq!(r.consumption_watts, 80.0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_get_same_events_in_order() {
        let hub = BroadcastHub::with_defaults();
        let mut sub1 = hub.subscribe();
        let mut sub2 = hub.subscribe();

        for watts in [10.0, 20.0, 30.0] {
            hub.publish_reading(reading(watts));
        }

        for sub in [&mut sub1, &mut sub2] {
            for expected in [10.0, 20.0, 30.0] {
                match sub.recv().await.unwrap() {
                    HubEvent::Reading(r) => assert_eq!(r.consumption_watts, expected),
                    other => panic!("unexpected event: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let hub = BroadcastHub::with_defaults();
        assert_eq!(hub.publish(&HubEvent::Reading(reading(80.0))), 0);
        assert_eq!(hub.stats().events_published, 1);
    }

    #[test]
    fn dropped_subscriber_is_removed_on_publish() {
        let hub = BroadcastHub::with_defaults();
        let gone = hub.subscribe();
        let mut alive = hub.subscribe();
        drop(gone);

        let delivered = hub.publish(&HubEvent::Reading(reading(80.0)));

        assert_eq!(delivered, 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.stats().subscribers_evicted, 1);
        assert!(alive.try_recv().is_some());
    }

    #[test]
    fn full_subscriber_is_evicted_without_affecting_others() {
        let hub = BroadcastHub::new(BroadcastConfig {
            subscriber_buffer: 2,
        });
        let mut stalled = hub.subscribe();
        let mut healthy = hub.subscribe();

        for watts in [1.0, 2.0] {
            hub.publish_reading(reading(watts));
            assert!(healthy.try_recv().is_some());
        }

        // stalled now holds two undrained events; the third overflows it
        hub.publish_reading(reading(3.0));

        assert_eq!(hub.subscriber_count(), 1);
        assert!(matches!(
            healthy.try_recv(),
            Some(HubEvent::Reading(r)) if r.consumption_watts == 3.0
        ));

        // buffered events are still readable, then the channel ends
        assert!(stalled.try_recv().is_some());
        assert!(stalled.try_recv().is_some());
        assert!(stalled.try_recv().is_none());
    }

    #[test]
    fn oversized_buffer_is_clamped() {
        let hub = BroadcastHub::new(BroadcastConfig {
            subscriber_buffer: usize::MAX,
        });
        let mut sub = hub.subscribe();
        hub.publish_reading(reading(5.0));
        assert!(sub.try_recv().is_some());
        assert_eq!(hub.config.subscriber_buffer, MAX_SUBSCRIBER_BUFFER);
    }

    #[test]
    fn zero_buffer_is_raised_to_one() {
        let hub = BroadcastHub::new(BroadcastConfig {
            subscriber_buffer: 0,
        });
        let mut sub = hub.subscribe();
        hub.publish_reading(reading(5.0));
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn hub_event_wire_format() {
        let r = reading(200.0);
        let json = serde_json::to_value(HubEvent::Reading(r.clone())).unwrap();
        assert_eq!(json["event"], "ReceiveEnergyUpdate");
        assert_eq!(json["data"]["deviceId"], "Fridge001");
        assert_eq!(json["data"]["consumptionWatts"], 200.0);

        let alert = AlertEvaluator::default().evaluate(&r).unwrap();
        let json = serde_json::to_value(HubEvent::Alert(alert)).unwrap();
        assert_eq!(json["event"], "ReceiveAlert");
        assert_eq!(json["data"]["consumption"], 200.0);
        assert_eq!(
            json["data"]["message"],
            "Fridge001 is consuming high energy: 200W!"
        );
    }

    #[test]
    fn stats_track_deliveries() {
        let hub = BroadcastHub::with_defaults();
        let _s1 = hub.subscribe();
        let _s2 = hub.subscribe();

        hub.publish_reading(reading(80.0));
        hub.publish_reading(reading(90.0));

        let stats = hub.stats();
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.events_delivered, 4);
    }
}
