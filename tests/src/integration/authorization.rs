//! # Authorization Gating
//!
//! Every publish and subscribe passes through the proof-gated authorization
//! service before the router acts. Covers denial side effects, verdict
//! caching and its expiry ceiling, namespace coverage, and fingerprint
//! invalidation taking effect immediately.

#[cfg(test)]
mod tests {
    use meshmq_auth::{AuthError, AuthorizationApi};
    use meshmq_routing::{RoutingApi, RoutingError};
    use meshmq_types::Column;

    use crate::integration::support::{broker, entity, publish, subscribe};

    #[tokio::test]
    async fn denied_operations_leave_no_trace() {
        let b = broker(&["vault"]);
        b.verifier.deny_everything(true);

        let err = b
            .terminus
            .subscribe(subscribe(entity(20), "vault/#", true))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));
        assert_eq!(b.terminus.subscription_count(), 0);
        assert_eq!(b.store.entry_count(Column::Persist), 0);

        let err = b
            .terminus
            .publish(publish(entity(21), "vault/key", b"secret", true))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));
        assert_eq!(b.store.entry_count(Column::Queue), 0);
        assert!(b.peers.forwards().is_empty());
    }

    #[tokio::test]
    async fn repeated_requests_are_served_from_the_verdict_cache() {
        let b = broker(&[]);
        let request = publish(entity(22), "metrics/cpu", b"0.42", false);

        b.terminus.publish(request.clone()).await.unwrap();
        b.terminus.publish(request.clone()).await.unwrap();
        assert_eq!(b.verifier.calls(), 1);
        assert_eq!(b.auth.cached_verdicts(), 1);

        // Past the verdict ceiling the cached allow is dead, even though the
        // claim itself would still be valid.
        b.clock.advance(301_000);
        b.terminus.publish(request).await.unwrap();
        assert_eq!(b.verifier.calls(), 2);
    }

    #[tokio::test]
    async fn grant_must_cover_the_resource_namespace() {
        let b = broker(&[]);
        b.verifier.pin_namespace("other");

        let err = b
            .terminus
            .publish(publish(entity(23), "sensors/room1/temp", b"21.5", false))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));

        let err = b
            .terminus
            .subscribe(subscribe(entity(23), "sensors/#", false))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));
        assert_eq!(b.terminus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn invalidation_purges_cached_verdicts_for_one_proof() {
        let b = broker(&[]);
        let sub = entity(24);

        b.terminus
            .subscribe(subscribe(sub, "feeds/#", false))
            .await
            .unwrap();
        let mut rx = b.terminus.attach(sub);

        let request = publish(entity(25), "feeds/news", b"v1", false);
        b.terminus.publish(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().message.payload, b"v1");

        // The verifier turns hostile, but the cached allow still serves.
        b.verifier.deny_everything(true);
        b.terminus.publish(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().message.payload, b"v1");

        // Invalidating the proof fingerprint forces re-verification, and
        // the revocation lands.
        let purged = b.auth.invalidate(&request.proof.fingerprint());
        assert_eq!(purged, 1);
        let err = b.terminus.publish(request).await.unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn invalidation_spares_verdicts_from_other_proofs() {
        let b = broker(&[]);
        let doomed = publish(entity(26), "alpha/x", b"1", false);
        let spared = publish(entity(26), "beta/y", b"2", false);

        b.terminus.publish(doomed.clone()).await.unwrap();
        b.terminus.publish(spared.clone()).await.unwrap();
        assert_eq!(b.auth.cached_verdicts(), 2);

        assert_eq!(b.auth.invalidate(&doomed.proof.fingerprint()), 1);
        assert_eq!(b.auth.cached_verdicts(), 1);

        // The untouched verdict keeps serving without a verifier round trip.
        let calls_before = b.verifier.calls();
        b.terminus.publish(spared).await.unwrap();
        assert_eq!(b.verifier.calls(), calls_before);
    }
}
