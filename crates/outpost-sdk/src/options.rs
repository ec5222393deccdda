// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Engine options

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::Duration;

use outpost::RelayUrl;

/// Default relay coverage goal per author
pub const DEFAULT_RELAY_GOAL_PER_AUTHOR: usize = 2;

/// Default timeout for relay list fetches
pub const DEFAULT_RELAY_LIST_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default relay list cache size
pub const DEFAULT_RELAY_LIST_CACHE_SIZE: usize = 10_000;

/// Engine options
#[derive(Debug, Clone)]
pub struct Options {
    /// Route author-scoped subscriptions through the authors' declared
    /// write relays (the outbox model). When disabled, every subscription
    /// goes to all available relays.
    pub outbox: bool,
    /// How many of an author's write relays to cover per subscription
    pub relay_goal_per_author: usize,
    /// How long to wait for a relay list fetch before treating the list
    /// as absent
    pub relay_list_fetch_timeout: Duration,
    /// Relays dedicated to relay-list discovery. When at least one of them
    /// holds a live connection, relay-list fetches are routed to this group
    /// instead of the general pool.
    pub discovery_relays: HashSet<RelayUrl>,
    /// Bound of the in-memory relay list cache
    pub relay_list_cache_size: NonZeroUsize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            outbox: true,
            relay_goal_per_author: DEFAULT_RELAY_GOAL_PER_AUTHOR,
            relay_list_fetch_timeout: DEFAULT_RELAY_LIST_FETCH_TIMEOUT,
            discovery_relays: HashSet::new(),
            relay_list_cache_size: NonZeroUsize::new(DEFAULT_RELAY_LIST_CACHE_SIZE)
                .expect("valid cache size"),
        }
    }
}

impl Options {
    /// New default options
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable outbox routing
    #[inline]
    pub fn outbox(mut self, enable: bool) -> Self {
        self.outbox = enable;
        self
    }

    /// Set the relay coverage goal per author
    #[inline]
    pub fn relay_goal_per_author(mut self, goal: usize) -> Self {
        self.relay_goal_per_author = goal;
        self
    }

    /// Set the relay list fetch timeout
    #[inline]
    pub fn relay_list_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.relay_list_fetch_timeout = timeout;
        self
    }

    /// Set the discovery relay group
    pub fn discovery_relays<I>(mut self, relays: I) -> Self
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        self.discovery_relays = relays.into_iter().collect();
        self
    }

    /// Set the relay list cache bound
    #[inline]
    pub fn relay_list_cache_size(mut self, size: NonZeroUsize) -> Self {
        self.relay_list_cache_size = size;
        self
    }
}
