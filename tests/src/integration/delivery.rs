//! # Live Fan-Out
//!
//! Publishes flowing through authorization, the pattern index, and the
//! per-subscriber channels to connected consumers. Covers wildcard matching
//! at the API surface, per-pattern duplication, backpressure drops, and the
//! absence of deliveries for disconnected non-persistent subscribers.

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use meshmq_routing::RoutingApi;
    use meshmq_types::Column;

    use crate::integration::support::{broker, entity, publish, subscribe};

    #[tokio::test]
    async fn published_payload_reaches_every_matching_subscriber() {
        let b = broker(&[]);
        let plus = entity(1);
        let hash = entity(2);
        let elsewhere = entity(3);

        b.terminus
            .subscribe(subscribe(plus, "sensors/+/temp", false))
            .await
            .unwrap();
        b.terminus
            .subscribe(subscribe(hash, "sensors/#", false))
            .await
            .unwrap();
        b.terminus
            .subscribe(subscribe(elsewhere, "alarms/#", false))
            .await
            .unwrap();

        let mut plus_rx = b.terminus.attach(plus);
        let mut hash_rx = b.terminus.attach(hash);
        let mut elsewhere_rx = b.terminus.attach(elsewhere);

        let receipt = b
            .terminus
            .publish(publish(entity(9), "sensors/room1/temp", b"21.5", false))
            .await
            .unwrap();
        assert_eq!(receipt.matched, 2);
        assert_eq!(receipt.handed, 2);

        let got = plus_rx.recv().await.unwrap();
        assert_eq!(got.message.payload, b"21.5");
        assert_eq!(got.message.topic.as_str(), "sensors/room1/temp");
        assert_eq!(
            got.pattern.as_ref().map(|p| p.as_str().to_string()),
            Some("sensors/+/temp".to_string())
        );

        let got = hash_rx.recv().await.unwrap();
        assert_eq!(got.message.payload, b"21.5");

        assert!(elsewhere_rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn trailing_wildcard_covers_the_bare_namespace() {
        let b = broker(&[]);
        let sub = entity(4);

        b.terminus
            .subscribe(subscribe(sub, "telemetry/#", false))
            .await
            .unwrap();
        let mut rx = b.terminus.attach(sub);

        let receipt = b
            .terminus
            .publish(publish(entity(9), "telemetry", b"root", false))
            .await
            .unwrap();
        assert_eq!(receipt.handed, 1);
        assert_eq!(rx.recv().await.unwrap().message.payload, b"root");
    }

    /// One subscriber, two overlapping patterns: the message arrives once
    /// per matching pattern, tagged with the pattern that matched.
    #[tokio::test]
    async fn overlapping_patterns_deliver_once_each() {
        let b = broker(&[]);
        let sub = entity(5);

        b.terminus
            .subscribe(subscribe(sub, "fleet/#", false))
            .await
            .unwrap();
        b.terminus
            .subscribe(subscribe(sub, "fleet/truck1", false))
            .await
            .unwrap();
        let mut rx = b.terminus.attach(sub);

        let receipt = b
            .terminus
            .publish(publish(entity(9), "fleet/truck1", b"ping", false))
            .await
            .unwrap();
        assert_eq!(receipt.matched, 2);
        assert_eq!(receipt.handed, 2);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.message.id, second.message.id);

        let mut patterns = vec![
            first.pattern.unwrap().as_str().to_string(),
            second.pattern.unwrap().as_str().to_string(),
        ];
        patterns.sort();
        assert_eq!(patterns, vec!["fleet/#", "fleet/truck1"]);
    }

    #[tokio::test]
    async fn slow_consumer_overflow_is_dropped_and_counted() {
        let b = broker(&[]);
        let sub = entity(6);

        b.terminus
            .subscribe(subscribe(sub, "burst/#", false))
            .await
            .unwrap();
        let mut rx = b.terminus.attach(sub);

        // The fixture buffers eight deliveries per subscriber.
        for n in 0..10u8 {
            b.terminus
                .publish(publish(entity(9), "burst/load", &[n], false))
                .await
                .unwrap();
        }
        assert_eq!(b.terminus.deliveries_dropped(), 2);

        let mut received = 0;
        while rx.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 8);
    }

    /// Queueing needs both sides to opt in. A disconnected subscriber gets
    /// nothing, without error, when either the message or the subscription
    /// is non-persistent, even on the designated router.
    #[tokio::test]
    async fn disconnected_subscriber_needs_persist_on_both_sides() {
        let b = broker(&["doors", "windows"]);

        b.terminus
            .subscribe(subscribe(entity(7), "doors/#", false))
            .await
            .unwrap();
        let receipt = b
            .terminus
            .publish(publish(entity(9), "doors/front", b"open", true))
            .await
            .unwrap();
        assert_eq!(receipt.matched, 1);
        assert_eq!(receipt.handed, 0);
        assert!(receipt.failed.is_empty());

        b.terminus
            .subscribe(subscribe(entity(8), "windows/#", true))
            .await
            .unwrap();
        let receipt = b
            .terminus
            .publish(publish(entity(9), "windows/north", b"ajar", false))
            .await
            .unwrap();
        assert_eq!(receipt.matched, 1);
        assert_eq!(receipt.handed, 0);
        assert!(receipt.failed.is_empty());

        assert_eq!(b.store.entry_count(Column::Queue), 0);
    }

    #[tokio::test]
    async fn delivery_handle_streams_messages() {
        let b = broker(&[]);
        let sub = entity(8);

        b.terminus
            .subscribe(subscribe(sub, "ticks/#", false))
            .await
            .unwrap();
        let mut rx = b.terminus.attach(sub);

        for n in 0..3u8 {
            b.terminus
                .publish(publish(entity(9), "ticks/second", &[n], false))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let delivery = rx.next().await.unwrap();
            seen.push(delivery.message.payload[0]);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
