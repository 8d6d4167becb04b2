//! # Broker Runtime
//!
//! Assembles the broker from configuration and owns its background tasks:
//! the subscription expiry sweep and the queue retention sweep. Shutdown
//! stops the sweeps, waits for them, and closes the queue engine so every
//! in-flight write finishes before the process exits.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use meshmq_auth::{AuthService, AuthorizationApi};
use meshmq_queue::{QueueError, QueueManager};
use meshmq_routing::{PeerGateway, RoutingError, Terminus};
use meshmq_types::{KeyValueStore, StorageError, SystemTimeSource, TimeSource};

use crate::adapters::{LoggingPeerGateway, RocksDbStore, StaticVerifier};
use crate::config::NodeConfig;

/// Failures while assembling or stopping the broker.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// A running broker: the routing core plus its background sweeps.
pub struct BrokerRuntime {
    terminus: Arc<Terminus>,
    auth: Arc<AuthService>,
    queues: Arc<QueueManager>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BrokerRuntime {
    /// Opens RocksDB under the configured data directory and starts the
    /// broker. Must be called within a tokio runtime.
    pub fn start(config: NodeConfig) -> Result<Self, RuntimeError> {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(RocksDbStore::open(config.rocksdb_config())?);
        Self::start_with_store(config, store, Arc::new(SystemTimeSource))
    }

    /// Same wiring over a caller-supplied store and clock. Tests run the
    /// whole broker over [`MemoryStore`](meshmq_types::MemoryStore) and a
    /// manual clock this way.
    pub fn start_with_store(
        config: NodeConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RuntimeError> {
        let verifier = Arc::new(StaticVerifier::new(
            config.static_grants(),
            Duration::from_secs(config.auth.grant_ttl_secs),
            Arc::clone(&clock),
        ));
        let auth = Arc::new(AuthService::new(
            config.auth_config(),
            verifier,
            Arc::clone(&clock),
        ));
        let queues = Arc::new(QueueManager::new(Arc::clone(&store)));
        let terminus = Arc::new(Terminus::new(
            config.routing_config(),
            Arc::clone(&auth) as Arc<dyn AuthorizationApi>,
            Arc::clone(&queues),
            Arc::new(LoggingPeerGateway::new()) as Arc<dyn PeerGateway>,
            store,
            Arc::clone(&clock),
        )?);

        let (shutdown, _) = watch::channel(false);
        let mut runtime = Self {
            terminus,
            auth,
            queues,
            shutdown,
            tasks: Vec::new(),
        };
        runtime
            .spawn_subscription_sweep(Duration::from_secs(config.routing.sweep_interval_secs));
        runtime.spawn_retention_sweep(
            Duration::from_secs(config.queue.sweep_interval_secs),
            Duration::from_secs(config.queue.retention_secs),
            clock,
        );

        info!(
            namespaces = ?config.routing.designated_namespaces,
            grants = config.auth.grants.len(),
            "broker assembled"
        );
        Ok(runtime)
    }

    fn spawn_subscription_sweep(&mut self, interval: Duration) {
        let terminus = Arc::clone(&self.terminus);
        let mut shutdown = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        terminus.sweep_expired().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    fn spawn_retention_sweep(
        &mut self,
        interval: Duration,
        retention: Duration,
        clock: Arc<dyn TimeSource>,
    ) {
        let queues = Arc::clone(&self.queues);
        let mut shutdown = self.shutdown.subscribe();
        let retention_millis = retention.as_millis() as u64;
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let older_than = clock.now_millis().saturating_sub(retention_millis);
                        match queues.sweep_retention(older_than) {
                            Ok(report) if report.evicted > 0 => {
                                info!(
                                    subscribers = report.subscribers,
                                    evicted = report.evicted,
                                    "queue retention sweep"
                                );
                            }
                            Ok(_) => {}
                            Err(QueueError::Closed) => break,
                            Err(error) => warn!(%error, "queue retention sweep failed"),
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// The routing core, for connection frontends and tests.
    pub fn terminus(&self) -> Arc<Terminus> {
        Arc::clone(&self.terminus)
    }

    /// The authorization service, for revocation feeds.
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    /// The durable queue engine.
    pub fn queues(&self) -> Arc<QueueManager> {
        Arc::clone(&self.queues)
    }

    /// Stops the background sweeps, waits for them, and closes the queue
    /// engine.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        info!("stopping broker");
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(error) = task.await {
                warn!(%error, "background task ended abnormally");
            }
        }
        self.queues.close()?;
        info!("broker stopped");
        Ok(())
    }
}
