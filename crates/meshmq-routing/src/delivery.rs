//! # Delivery Channels
//!
//! Bounded per-subscriber channels between the router and connected
//! consumers. Attaching yields a [`DeliveryHandle`]; a second attach for the
//! same subscriber supersedes the first, whose handle then drains to `None`.
//! When a channel is full the message is dropped rather than the publisher
//! blocked, and the drop is counted.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use meshmq_types::{EntityId, Message, Pattern};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// One message handed to a subscriber.
///
/// Live fan-out carries the pattern that matched; a drained backlog entry
/// carries the queue sequence to acknowledge instead.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Arc<Message>,
    pub pattern: Option<Pattern>,
    pub seq: Option<u64>,
}

/// Result of offering a delivery to a subscriber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OfferOutcome {
    Delivered,
    BufferFull,
    NotConnected,
}

struct ActiveChannel {
    /// Monotonic attach id, so a stale handle cannot detach its successor.
    connection: u64,
    sender: mpsc::Sender<Delivery>,
}

pub(crate) struct DeliveryRegistry {
    buffer_capacity: usize,
    channels: RwLock<HashMap<EntityId, ActiveChannel>>,
    connection_seq: AtomicU64,
    dropped: AtomicU64,
}

impl DeliveryRegistry {
    pub(crate) fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity: buffer_capacity.max(1),
            channels: RwLock::new(HashMap::new()),
            connection_seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Opens a channel for `subscriber`, superseding any previous one.
    pub(crate) fn attach(registry: &Arc<Self>, subscriber: EntityId) -> DeliveryHandle {
        let (sender, receiver) = mpsc::channel(registry.buffer_capacity);
        let connection = registry.connection_seq.fetch_add(1, Ordering::Relaxed) + 1;
        registry
            .channels
            .write()
            .insert(subscriber, ActiveChannel { connection, sender });
        DeliveryHandle {
            subscriber,
            connection,
            receiver,
            registry: Arc::clone(registry),
        }
    }

    /// Hands `delivery` to the subscriber without blocking. A full buffer
    /// drops the delivery; a closed or missing channel reports
    /// `NotConnected`.
    pub(crate) fn offer(&self, subscriber: &EntityId, delivery: Delivery) -> OfferOutcome {
        let closed_connection = {
            let channels = self.channels.read();
            let Some(channel) = channels.get(subscriber) else {
                return OfferOutcome::NotConnected;
            };
            match channel.sender.try_send(delivery) {
                Ok(()) => return OfferOutcome::Delivered,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return OfferOutcome::BufferFull;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => channel.connection,
            }
        };
        // The handle went away without a clean detach. Reap the entry so a
        // later attach starts fresh.
        let mut channels = self.channels.write();
        if channels
            .get(subscriber)
            .is_some_and(|c| c.connection == closed_connection)
        {
            channels.remove(subscriber);
            debug!(subscriber = %subscriber, "reaped closed delivery channel");
        }
        OfferOutcome::NotConnected
    }

    /// Whether the subscriber currently holds an open channel.
    pub(crate) fn is_attached(&self, subscriber: &EntityId) -> bool {
        self.channels
            .read()
            .get(subscriber)
            .is_some_and(|c| !c.sender.is_closed())
    }

    /// Removes the channel, but only if it is still the given attach.
    fn detach(&self, subscriber: &EntityId, connection: u64) {
        let mut channels = self.channels.write();
        if channels
            .get(subscriber)
            .is_some_and(|c| c.connection == connection)
        {
            channels.remove(subscriber);
        }
    }

    /// Deliveries dropped because a subscriber buffer was full.
    pub(crate) fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer end of a subscriber channel. Dropping it detaches the
/// subscriber.
pub struct DeliveryHandle {
    subscriber: EntityId,
    connection: u64,
    receiver: mpsc::Receiver<Delivery>,
    registry: Arc<DeliveryRegistry>,
}

impl DeliveryHandle {
    pub fn subscriber(&self) -> &EntityId {
        &self.subscriber
    }

    /// Waits for the next delivery. Returns `None` once the handle has been
    /// superseded by a newer attach.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for DeliveryHandle {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Delivery>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for DeliveryHandle {
    fn drop(&mut self) {
        self.registry.detach(&self.subscriber, self.connection);
    }
}

impl std::fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("subscriber", &self.subscriber)
            .field("connection", &self.connection)
            .finish()
    }
}
