// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Outbox-model subscription and routing engine for Nostr.
//!
//! The engine answers one question: which relays should be contacted to
//! satisfy a query or a publish, given what the requested authors have
//! declared about their relay preferences. Connections and storage stay
//! outside, behind the `outpost-pool` traits and the [`EventStore`]
//! interface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]
#![warn(clippy::large_futures)]

pub use outpost;
pub use outpost_pool as pool;

mod client;
pub mod error;
pub mod metrics;
pub mod options;
pub mod outbox;
pub mod prelude;
pub mod router;
pub mod store;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod test_util;

pub use self::client::{Client, ClientBuilder};
pub use self::error::Error;
pub use self::metrics::{Metrics, MetricsSnapshot};
pub use self::options::Options;
pub use self::outbox::{OutboxTracker, RelayListDiscovery};
pub use self::router::RelayRouter;
pub use self::store::{EventStore, StoreError};
pub use self::subscriptions::Subscription;
