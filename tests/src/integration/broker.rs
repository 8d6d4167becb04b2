//! # Assembled Broker
//!
//! The whole node as the binary wires it: configuration file, RocksDB
//! storage, static grant table, background sweeps, and shutdown. These are
//! the closest tests to production wiring; everything else in the suite
//! swaps at least one seam for a double.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use meshmq_auth::{AuthError, Operation};
    use meshmq_node::config::GrantEntry;
    use meshmq_node::{BrokerRuntime, NodeConfig};
    use meshmq_routing::{RoutingApi, RoutingError};
    use meshmq_types::{KeyValueStore, ManualTimeSource, MemoryStore, TimeSource};

    use crate::integration::support::{entity, publish, subscribe, START};

    fn disk_config(data_dir: &std::path::Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.storage.data_dir = data_dir.to_path_buf();
        config.storage.sync_writes = false;
        config.storage.write_buffer_size = 4 * 1024 * 1024;
        config.storage.block_cache_size = 8 * 1024 * 1024;
        config
    }

    #[tokio::test]
    async fn config_file_drives_a_rocksdb_backed_broker() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("meshmq.json");
        let raw = format!(
            r#"{{
                "storage": {{
                    "data_dir": "{data_dir}",
                    "sync_writes": false,
                    "write_buffer_size": 4194304,
                    "block_cache_size": 8388608
                }},
                "routing": {{ "designated_namespaces": ["sensors"] }},
                "auth": {{
                    "grants": [
                        {{ "subject": "{subscriber}", "operation": "subscribe", "namespace": "sensors" }},
                        {{ "subject": "{publisher}", "operation": "publish", "namespace": "sensors" }}
                    ]
                }}
            }}"#,
            data_dir = dir.path().join("broker-data").display(),
            subscriber = "01".repeat(32),
            publisher = "09".repeat(32),
        );
        std::fs::write(&config_path, raw).unwrap();

        let config = NodeConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.routing.designated_namespaces, vec!["sensors"]);

        let runtime = BrokerRuntime::start(config).unwrap();
        let terminus = runtime.terminus();

        terminus
            .subscribe(subscribe(entity(1), "sensors/+/temp", true))
            .await
            .unwrap();
        let receipt = terminus
            .publish(publish(entity(9), "sensors/room1/temp", b"21.5", true))
            .await
            .unwrap();
        assert_eq!(receipt.handed, 1);

        let mut rx = terminus.attach(entity(1));
        assert_eq!(terminus.flush_backlog(&entity(1)).unwrap(), 1);
        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.message.payload, b"21.5");
        assert!(terminus.ack(&entity(1), delivery.seq.unwrap()).unwrap());

        drop(terminus);
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn durable_state_survives_a_full_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = disk_config(&dir.path().join("broker-data"));
        config.routing.designated_namespaces = vec!["jobs".to_string()];
        config.auth.grants.push(GrantEntry {
            subject: [1; 32],
            operation: None,
            namespace: "jobs".to_string(),
        });
        config.auth.grants.push(GrantEntry {
            subject: [9; 32],
            operation: None,
            namespace: "jobs".to_string(),
        });

        {
            let runtime = BrokerRuntime::start(config.clone()).unwrap();
            let terminus = runtime.terminus();
            terminus
                .subscribe(subscribe(entity(1), "jobs/#", true))
                .await
                .unwrap();
            terminus
                .publish(publish(entity(9), "jobs/build", b"artifact", true))
                .await
                .unwrap();
            drop(terminus);
            runtime.shutdown().await.unwrap();
        }

        let runtime = BrokerRuntime::start(config).unwrap();
        let terminus = runtime.terminus();
        assert_eq!(terminus.subscription_count(), 1);

        let mut rx = terminus.attach(entity(1));
        assert_eq!(terminus.flush_backlog(&entity(1)).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().message.payload, b"artifact");

        drop(terminus);
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn static_grants_scope_entities_to_operations() {
        let mut config = NodeConfig::default();
        config.auth.grants.push(GrantEntry {
            subject: [7; 32],
            operation: Some(Operation::Publish),
            namespace: "tele".to_string(),
        });

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn TimeSource> = Arc::new(ManualTimeSource::new(START));
        let runtime = BrokerRuntime::start_with_store(config, store, clock).unwrap();
        let terminus = runtime.terminus();

        terminus
            .publish(publish(entity(7), "tele/cpu", b"0.93", false))
            .await
            .unwrap();
        let err = terminus
            .subscribe(subscribe(entity(7), "tele/#", false))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Auth(AuthError::Denied)));

        let queues = runtime.queues();
        runtime.shutdown().await.unwrap();
        assert!(queues.is_closed());
    }
}
