//! Ingestion Flow Integration Tests
//!
//! Drives the ingestion service against a real broadcast hub and history
//! store: ordering, alerts, rejection and subscriber eviction.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]

use std::sync::Arc;

use telemetry_hub::{
    AlertEvaluator, BroadcastConfig, BroadcastHub, HistoryQueryService, HistoryStore, HubEvent,
    IngestionService, Reading, ValidationError,
};

struct Harness {
    ingestion: IngestionService<BroadcastHub>,
    history: HistoryQueryService,
    hub: Arc<BroadcastHub>,
}

fn harness(capacity: usize, subscriber_buffer: usize) -> Harness {
    let store = Arc::new(HistoryStore::new(capacity));
    let hub = Arc::new(BroadcastHub::new(BroadcastConfig { subscriber_buffer }));
    let ingestion = IngestionService::new(
        Arc::clone(&store),
        AlertEvaluator::default(),
        Arc::clone(&hub),
    );
    Harness {
        ingestion,
        history: HistoryQueryService::new(store),
        hub,
    }
}

#[test]
fn high_reading_pushes_update_then_alert() {
    let h = harness(1000, 16);
    let mut subscription = h.hub.subscribe();

    h.ingestion.ingest(Reading::now("Fridge001", 80.0)).unwrap();
    h.ingestion.ingest(Reading::now("Fridge001", 200.0)).unwrap();

    match subscription.try_recv() {
        Some(HubEvent::Reading(r)) => assert_eq!(r.consumption_watts, 80.0),
        other => panic!("expected first reading, got {other:?}"),
    }
    match subscription.try_recv() {
        Some(HubEvent::Reading(r)) => assert_eq!(r.consumption_watts, 200.0),
        other => panic!("expected second reading, got {other:?}"),
    }
    match subscription.try_recv() {
        Some(HubEvent::Alert(alert)) => {
            assert_eq!(alert.device_id, "Fridge001");
            assert_eq!(alert.consumption_watts, 200.0);
            assert_eq!(alert.message, "Fridge001 is consuming high energy: 200W!");
        }
        other => panic!("expected alert, got {other:?}"),
    }
    assert!(subscription.try_recv().is_none());

    let history = h.history.get_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].consumption_watts, 80.0);
    assert_eq!(history[1].consumption_watts, 200.0);
}

#[test]
fn threshold_reading_is_not_an_alert() {
    let h = harness(10, 16);
    let mut subscription = h.hub.subscribe();

    h.ingestion.ingest(Reading::now("Lights003", 170.0)).unwrap();

    assert!(matches!(subscription.try_recv(), Some(HubEvent::Reading(_))));
    assert!(subscription.try_recv().is_none());
    assert_eq!(h.ingestion.stats().alerts, 0);
}

#[test]
fn rejected_reading_has_no_side_effects() {
    let h = harness(10, 16);
    let mut subscription = h.hub.subscribe();

    let err = h
        .ingestion
        .ingest(Reading::now("Fridge001", -1.0))
        .unwrap_err();
    assert_eq!(err, ValidationError::NegativeConsumption(-1.0));

    let err = h.ingestion.ingest(Reading::now("  ", 10.0)).unwrap_err();
    assert_eq!(err, ValidationError::EmptyDeviceId);

    assert!(subscription.try_recv().is_none());
    assert!(h.history.is_empty());
    assert_eq!(h.hub.stats().events_published, 0);
    assert_eq!(h.ingestion.stats().rejected, 2);
}

#[test]
fn concurrent_producers_keep_their_own_order() {
    const PRODUCERS: usize = 3;
    const PER_PRODUCER: usize = 500;

    let h = harness(1000, PRODUCERS * PER_PRODUCER);
    let mut subscription = h.hub.subscribe();

    std::thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let ingestion = &h.ingestion;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    ingestion
                        .ingest(Reading::now(format!("Device{producer}"), seq as f64 / 10.0))
                        .unwrap();
                }
            });
        }
    });

    let history = h.history.get_history();
    assert_eq!(history.len(), 1000);

    // Within the window each producer's readings stay strictly increasing.
    for producer in 0..PRODUCERS {
        let id = format!("Device{producer}");
        let seqs: Vec<f64> = history
            .iter()
            .filter(|r| r.device_id == id)
            .map(|r| r.consumption_watts)
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]), "{id} out of order");
    }

    // The subscriber saw every reading, each producer's in order.
    let mut last_seen = [-1.0_f64; PRODUCERS];
    let mut received = 0;
    while let Some(event) = subscription.try_recv() {
        let HubEvent::Reading(reading) = event else {
            panic!("no alerts expected below threshold");
        };
        let producer: usize = reading.device_id["Device".len()..].parse().unwrap();
        assert!(reading.consumption_watts > last_seen[producer]);
        last_seen[producer] = reading.consumption_watts;
        received += 1;
    }
    assert_eq!(received, PRODUCERS * PER_PRODUCER);
}

#[test]
fn concurrent_producers_without_subscribers_keep_inputs() {
    const PRODUCERS: usize = 3;
    const PER_PRODUCER: usize = 500;

    let h = harness(1000, 16);
    let base = chrono::DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);

    let submitted: Vec<Vec<Reading>> = (0..PRODUCERS)
        .map(|producer| {
            (0..PER_PRODUCER)
                .map(|seq| {
                    let n = producer * PER_PRODUCER + seq;
                    let offset = chrono::Duration::milliseconds(i64::try_from(n).unwrap());
                    Reading::new(format!("Device{producer}"), n as f64 / 100.0, base + offset)
                })
                .collect()
        })
        .collect();

    std::thread::scope(|scope| {
        for readings in &submitted {
            let ingestion = &h.ingestion;
            scope.spawn(move || {
                for reading in readings {
                    ingestion.ingest(reading.clone()).unwrap();
                }
            });
        }
    });

    assert_eq!(h.ingestion.stats().accepted, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(h.hub.subscriber_count(), 0);

    let history = h.history.get_history();
    assert_eq!(history.len(), 1000);
    for entry in &history {
        assert!(
            submitted.iter().flatten().any(|r| r == entry),
            "{entry:?} was never submitted"
        );
    }
}

#[test]
fn stalled_subscriber_is_evicted_without_affecting_others() {
    let h = harness(100, 2);
    let mut healthy = h.hub.subscribe();
    let _stalled = h.hub.subscribe();
    assert_eq!(h.hub.subscriber_count(), 2);

    for watts in 1..=5 {
        h.ingestion
            .ingest(Reading::now("Fridge001", f64::from(watts)))
            .unwrap();
        match healthy.try_recv() {
            Some(HubEvent::Reading(r)) => assert_eq!(r.consumption_watts, f64::from(watts)),
            other => panic!("expected reading {watts}, got {other:?}"),
        }
    }

    assert_eq!(h.hub.subscriber_count(), 1);
    assert_eq!(h.hub.stats().subscribers_evicted, 1);
    assert_eq!(h.history.len(), 5);
}

#[test]
fn dropped_subscriber_is_removed_on_next_publish() {
    let h = harness(10, 8);
    let subscription = h.hub.subscribe();
    drop(subscription);

    h.ingestion.ingest(Reading::now("Fridge001", 80.0)).unwrap();

    assert_eq!(h.hub.subscriber_count(), 0);
    assert_eq!(h.history.len(), 1);
}

#[test]
fn history_keeps_most_recent_window() {
    let h = harness(1000, 1);

    for seq in 0..1200 {
        h.ingestion
            .ingest(Reading::now("Fridge001", f64::from(seq)))
            .unwrap();
    }

    let history = h.history.get_history();
    assert_eq!(history.len(), 1000);
    assert_eq!(history[0].consumption_watts, 200.0);
    assert_eq!(history[999].consumption_watts, 1199.0);
}
