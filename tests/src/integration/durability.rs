//! # Durable Queueing
//!
//! The store-and-forward path: persistent publishes queued for offline
//! subscribers on the designated router, backlog replay on reattach,
//! acknowledgement semantics, restart recovery, and retention.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use meshmq_routing::RoutingApi;
    use meshmq_types::{Column, ManualTimeSource, MemoryStore};

    use crate::integration::support::{broker, broker_over, entity, publish, subscribe, START};

    #[tokio::test]
    async fn offline_persistent_subscriber_gets_exactly_one_durable_copy() {
        let b = broker(&["sensors"]);
        let sub = entity(10);
        let payload: [u8; 16] = rand::random();

        b.terminus
            .subscribe(subscribe(sub, "sensors/+/temp", true))
            .await
            .unwrap();

        let receipt = b
            .terminus
            .publish(publish(entity(9), "sensors/room1/temp", &payload, true))
            .await
            .unwrap();
        assert_eq!(receipt.matched, 1);
        assert_eq!(receipt.handed, 1);
        assert!(receipt.failed.is_empty());

        let entries: Vec<_> = b.queues.drain(&sub).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let stored = &entries[0].message;
        assert_eq!(stored.payload, payload);
        assert_eq!(stored.topic.as_str(), "sensors/room1/temp");
        assert_eq!(stored.source, entity(9));
        assert!(stored.persist);
        assert_eq!(stored.published_at, START);
    }

    #[tokio::test]
    async fn backlog_replays_in_order_and_acks_are_idempotent() {
        let b = broker(&["jobs"]);
        let sub = entity(11);

        b.terminus
            .subscribe(subscribe(sub, "jobs/#", true))
            .await
            .unwrap();
        for n in 1..=3u8 {
            b.terminus
                .publish(publish(entity(9), "jobs/build", &[n], true))
                .await
                .unwrap();
        }

        let mut rx = b.terminus.attach(sub);
        assert_eq!(b.terminus.flush_backlog(&sub).unwrap(), 3);

        let mut replayed = Vec::new();
        for _ in 0..3 {
            let delivery = rx.recv().await.unwrap();
            assert!(delivery.pattern.is_none());
            replayed.push((delivery.seq.unwrap(), delivery.message.payload[0]));
        }
        assert_eq!(
            replayed.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(replayed.windows(2).all(|w| w[0].0 < w[1].0));

        // Replay is not removal: the backlog survives until acknowledged.
        assert_eq!(b.queues.drain(&sub).unwrap().count(), 3);

        let first_seq = replayed[0].0;
        for (seq, _) in &replayed {
            assert!(b.terminus.ack(&sub, *seq).unwrap());
        }
        assert!(!b.terminus.ack(&sub, first_seq).unwrap());
        assert_eq!(b.queues.drain(&sub).unwrap().count(), 0);

        // With the backlog cleared, traffic flows live and carries the
        // matched pattern instead of a queue sequence.
        b.terminus
            .publish(publish(entity(9), "jobs/deploy", b"go", true))
            .await
            .unwrap();
        let live = rx.recv().await.unwrap();
        assert_eq!(live.pattern.unwrap().as_str(), "jobs/#");
        assert!(live.seq.is_none());
        assert_eq!(b.queues.drain(&sub).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn restart_restores_subscriptions_and_sequence_numbers() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualTimeSource::new(START));
        let sub = entity(12);

        let first = broker_over(&["sensors"], Arc::clone(&store), Arc::clone(&clock));
        first
            .terminus
            .subscribe(subscribe(sub, "sensors/+/temp", true))
            .await
            .unwrap();
        first
            .terminus
            .publish(publish(entity(9), "sensors/room1/temp", b"before", true))
            .await
            .unwrap();
        drop(first);

        let second = broker_over(&["sensors"], Arc::clone(&store), Arc::clone(&clock));
        assert_eq!(second.terminus.subscription_count(), 1);

        second
            .terminus
            .publish(publish(entity(9), "sensors/room2/temp", b"after", true))
            .await
            .unwrap();

        let mut rx = second.terminus.attach(sub);
        assert_eq!(second.terminus.flush_backlog(&sub).unwrap(), 2);
        let a = rx.recv().await.unwrap();
        let z = rx.recv().await.unwrap();
        assert_eq!(a.message.payload, b"before");
        assert_eq!(z.message.payload, b"after");
        assert!(a.seq.unwrap() < z.seq.unwrap());
    }

    #[tokio::test]
    async fn restart_discards_expired_subscription_records() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualTimeSource::new(START));

        let first = broker_over(&["sensors"], Arc::clone(&store), Arc::clone(&clock));
        let mut lapsing = subscribe(entity(13), "sensors/old/#", true);
        lapsing.ttl = Duration::from_secs(60);
        first.terminus.subscribe(lapsing).await.unwrap();
        first
            .terminus
            .subscribe(subscribe(entity(14), "sensors/new/#", true))
            .await
            .unwrap();
        assert_eq!(store.entry_count(Column::Persist), 2);
        drop(first);

        clock.advance(120_000);
        let second = broker_over(&["sensors"], Arc::clone(&store), Arc::clone(&clock));
        assert_eq!(second.terminus.subscription_count(), 1);
        assert_eq!(store.entry_count(Column::Persist), 1);
    }

    #[tokio::test]
    async fn retention_sweep_evicts_only_stale_entries() {
        let b = broker(&["audit"]);
        let sub = entity(15);

        b.terminus
            .subscribe(subscribe(sub, "audit/#", true))
            .await
            .unwrap();
        b.terminus
            .publish(publish(entity(9), "audit/login", b"stale", true))
            .await
            .unwrap();
        b.clock.advance(100_000);
        b.terminus
            .publish(publish(entity(9), "audit/login", b"fresh", true))
            .await
            .unwrap();

        let cutoff = b.clock.now_millis() - 50_000;
        let report = b.queues.sweep_retention(cutoff).unwrap();
        assert_eq!(report.subscribers, 1);
        assert_eq!(report.evicted, 1);

        let entries: Vec<_> = b.queues.drain(&sub).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message.payload, b"fresh");
    }

    #[tokio::test]
    async fn expiry_sweep_purges_the_backlog_of_lapsed_subscribers() {
        let b = broker(&["sensors"]);
        let sub = entity(16);

        let mut request = subscribe(sub, "sensors/#", true);
        request.ttl = Duration::from_secs(60);
        b.terminus.subscribe(request).await.unwrap();
        b.terminus
            .publish(publish(entity(9), "sensors/room1/temp", b"queued", true))
            .await
            .unwrap();
        assert_eq!(b.queues.drain(&sub).unwrap().count(), 1);

        b.clock.advance(120_000);
        let report = b.terminus.sweep_expired().await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.purged_entries, 1);

        assert_eq!(b.terminus.subscription_count(), 0);
        assert_eq!(b.queues.drain(&sub).unwrap().count(), 0);
    }
}
