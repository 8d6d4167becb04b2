//! # MeshMQ Routing Crate
//!
//! The routing core of the broker, called Terminus. It owns the subscription
//! index, matches published topics against wildcard patterns, fans messages
//! out to live subscribers, hands them to the durable queue engine for
//! absent ones, and enforces designated-router responsibility per namespace.
//!
//! ```text
//!                 +------------------------------------------+
//!                 |                 Terminus                 |
//!                 |                                          |
//!  Publish ------>|  authorize -> match -> deliver | enqueue |----> DeliveryHandle
//!  Subscribe ---->|  authorize -> persist -> index -> drain  |----> QueueManager
//!  Unsubscribe -->|  remove -> notify peers                  |----> PeerGateway
//!                 |                                          |
//!                 |  expiry sweep: index + records + queues  |
//!                 +------------------------------------------+
//! ```
//!
//! ## Hexagonal Architecture
//!
//! - `domain/`: subscriptions, requests and receipts, the pattern trie.
//! - `ports/inbound`: [`RoutingApi`], what connection servers call.
//! - `ports/outbound`: [`PeerGateway`], the federation seam.
//! - `service`: [`Terminus`] wiring it all together.

pub mod delivery;
pub mod domain;
pub mod ports;
pub mod service;

pub use delivery::{Delivery, DeliveryHandle};
pub use domain::entities::{
    PublishOrigin, PublishReceipt, PublishRequest, SubscribeRequest, Subscription,
    SubscriptionOrigin, SubscriptionReceipt, SweepReport, UnsubscribeOutcome,
};
pub use domain::errors::RoutingError;
pub use ports::inbound::RoutingApi;
pub use ports::outbound::{PeerError, PeerGateway};
pub use service::{RoutingConfig, Terminus};
