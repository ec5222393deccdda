// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay pool interface consumed by the outpost engine.
//!
//! The engine never owns connections: it asks the pool for relay handles,
//! sends subscribe/unsubscribe/publish requests through them and reads
//! inbound protocol frames from the pool notification channel. Connection
//! lifecycle, reconnection and backoff are the pool's concern.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use core::fmt;
use std::collections::HashSet;
use std::sync::Arc;

use outpost::util::BoxedFuture;
use outpost::{Event, Filter, RelayMessage, RelayUrl, SubscriptionId};
use tokio::sync::broadcast;

/// Relay pool error
#[derive(Debug)]
pub enum Error {
    /// The pool has no connected relays
    NoRelaysConnected,
    /// Backend error
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRelaysConnected => write!(f, "No relays connected"),
            Self::Backend(e) => e.fmt(f),
        }
    }
}

impl Error {
    /// Create a new backend error
    ///
    /// Shorthand for `Error::Backend(Box::new(error))`.
    #[inline]
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}

/// Relay connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelayStatus {
    /// Relay registered, not yet connected
    Initialized,
    /// Connection attempt in progress
    Connecting,
    /// Connected
    Connected,
    /// Disconnected, will retry
    Disconnected,
    /// Terminated, will not retry
    Terminated,
}

impl RelayStatus {
    /// Check if the relay is connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Notification broadcast by the pool to every listener
#[derive(Debug, Clone)]
pub enum RelayPoolNotification {
    /// Received an event for a subscription
    Event {
        /// Relay url
        relay_url: RelayUrl,
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Event
        event: Box<Event>,
    },
    /// Received a raw relay frame (EVENT, EOSE, OK, CLOSED, NOTICE, AUTH)
    Message {
        /// Relay url
        relay_url: RelayUrl,
        /// Relay message
        message: RelayMessage,
    },
    /// Relay status changed
    RelayStatus {
        /// Relay url
        relay_url: RelayUrl,
        /// Status
        status: RelayStatus,
    },
    /// Pool shutdown
    Shutdown,
}

/// A single relay handle
pub trait Relay: fmt::Debug + Send + Sync {
    /// Relay url
    fn url(&self) -> &RelayUrl;

    /// Current connection status
    fn status(&self) -> RelayStatus;

    /// Send a `REQ` for the given subscription id
    fn subscribe<'a>(
        &'a self,
        id: SubscriptionId,
        filters: Vec<Filter>,
    ) -> BoxedFuture<'a, Result<(), Error>>;

    /// Send a `CLOSE` for the given subscription id
    fn unsubscribe<'a>(&'a self, id: &'a SubscriptionId) -> BoxedFuture<'a, Result<(), Error>>;

    /// Send an `EVENT` message
    fn send_event<'a>(&'a self, event: &'a Event) -> BoxedFuture<'a, Result<(), Error>>;
}

/// The relay pool surface the engine consumes
pub trait RelayPool: fmt::Debug + Send + Sync {
    /// All registered relay urls
    fn available_relays(&self) -> BoxedFuture<HashSet<RelayUrl>>;

    /// Urls of relays that currently hold a live connection
    fn connected_relays(&self) -> BoxedFuture<HashSet<RelayUrl>>;

    /// Get a relay handle, if the relay is registered
    fn relay<'a>(&'a self, url: &'a RelayUrl) -> BoxedFuture<'a, Option<Arc<dyn Relay>>>;

    /// Register a temporary relay and get its handle.
    ///
    /// If the relay is already registered, the existing handle is reused.
    fn add_temporary_relay<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<Arc<dyn Relay>, Error>>;

    /// Subscribe to pool notifications
    fn notifications(&self) -> broadcast::Receiver<RelayPoolNotification>;
}

impl RelayPool for Arc<dyn RelayPool> {
    #[inline]
    fn available_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
        self.as_ref().available_relays()
    }

    #[inline]
    fn connected_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
        self.as_ref().connected_relays()
    }

    #[inline]
    fn relay<'a>(&'a self, url: &'a RelayUrl) -> BoxedFuture<'a, Option<Arc<dyn Relay>>> {
        self.as_ref().relay(url)
    }

    #[inline]
    fn add_temporary_relay<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<Arc<dyn Relay>, Error>> {
        self.as_ref().add_temporary_relay(url)
    }

    #[inline]
    fn notifications(&self) -> broadcast::Receiver<RelayPoolNotification> {
        self.as_ref().notifications()
    }
}

/// Prelude
pub mod prelude {
    #![allow(unknown_lints)]
    #![allow(ambiguous_glob_reexports)]
    #![doc(hidden)]

    pub use crate::*;
}
