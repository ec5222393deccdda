// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay-set calculator
//!
//! Turns a set of filters into the set of relays worth querying: cover
//! every requested author with a bounded number of their declared write
//! relays, preferring connections that are already open.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_utility::task;
use outpost::{Filter, PublicKey, RelayUrl};
use outpost_pool::{Relay, RelayPool};

use crate::metrics::Metrics;
use crate::options::Options;
use crate::outbox::OutboxTracker;

/// Relay-set calculator
#[derive(Debug)]
pub struct RelayRouter {
    pool: Arc<dyn RelayPool>,
    tracker: Arc<OutboxTracker>,
    metrics: Arc<Metrics>,
    opts: Options,
}

impl RelayRouter {
    pub(crate) fn new(
        pool: Arc<dyn RelayPool>,
        tracker: Arc<OutboxTracker>,
        metrics: Arc<Metrics>,
        opts: Options,
    ) -> Self {
        Self {
            pool,
            tracker,
            metrics,
            opts,
        }
    }

    /// Compute the relays that satisfy the given filters.
    ///
    /// With outbox routing disabled, or when no filter constrains authors,
    /// no optimization is attempted and every available relay is returned.
    /// Otherwise each author is covered by up to `relay_goal_per_author` of
    /// their cached write relays in two passes: already-connected relays
    /// first, then top-ups that may introduce new (temporary) connections.
    ///
    /// Authors without a cached relay list never block this call: a
    /// best-effort fetch is spawned for them, its result benefits future
    /// calculations.
    pub async fn relays_for_filters(&self, filters: &[Filter]) -> Vec<Arc<dyn Relay>> {
        self.metrics.record_subscription_calculated();

        let authors: BTreeSet<PublicKey> = filters
            .iter()
            .flat_map(|f| f.authors.iter().flatten().copied())
            .collect();

        if !self.opts.outbox || authors.is_empty() {
            return self.all_available().await;
        }

        // Cache-only lookups; uncovered authors are fetched in background
        let mut author_relays: Vec<(PublicKey, BTreeSet<RelayUrl>)> = Vec::new();
        let mut uncovered: Vec<PublicKey> = Vec::new();

        for author in authors.into_iter() {
            match self.tracker.relay_list(&author).await {
                Some(list) if !list.write.is_empty() => {
                    author_relays.push((author, list.write));
                }
                _ => uncovered.push(author),
            }
        }

        self.spawn_uncovered_fetches(uncovered);

        let connected: HashSet<RelayUrl> = self.pool.connected_relays().await;
        let goal: usize = self.opts.relay_goal_per_author;
        let mut selected: HashSet<RelayUrl> = HashSet::new();

        // Pass 1: per author, up to `goal` write relays that are already
        // connected. Minimizes new connections.
        let mut coverage: HashMap<PublicKey, usize> = HashMap::new();
        for (author, write_relays) in author_relays.iter() {
            let mut count: usize = 0;
            for url in write_relays.iter() {
                if count >= goal {
                    break;
                }
                if connected.contains(url) {
                    selected.insert(url.clone());
                    count += 1;
                }
            }
            coverage.insert(*author, count);
        }

        // Pass 2: top up authors still below the goal. Relays already
        // selected for other authors count toward coverage for free.
        for (author, write_relays) in author_relays.iter() {
            let mut count: usize = write_relays
                .iter()
                .filter(|url| selected.contains(*url))
                .count();
            for url in write_relays.iter() {
                if count >= goal {
                    break;
                }
                if selected.insert(url.clone()) {
                    count += 1;
                }
            }
            coverage.insert(*author, count);
        }

        // No author produced a single relay: query the whole pool rather
        // than nothing.
        if selected.is_empty() {
            tracing::debug!("No write relay known for any requested author, using the full pool.");
            return self.all_available().await;
        }

        tracing::debug!(
            relays = selected.len(),
            authors = coverage.len(),
            "Calculated relay set."
        );

        self.resolve(selected).await
    }

    fn spawn_uncovered_fetches(&self, uncovered: Vec<PublicKey>) {
        if uncovered.is_empty() {
            return;
        }

        let tracker: Arc<OutboxTracker> = self.tracker.clone();
        let timeout = self.opts.relay_list_fetch_timeout;

        task::spawn(async move {
            for public_key in uncovered.into_iter() {
                // Best effort: absence is fine, the result feeds future calls
                let _ = tracker.fetch_relay_list(public_key, timeout).await;
            }
        });
    }

    async fn all_available(&self) -> Vec<Arc<dyn Relay>> {
        let urls: HashSet<RelayUrl> = self.pool.available_relays().await;
        self.resolve(urls).await
    }

    /// Resolve urls through the pool: existing handles are reused,
    /// temporary entries are registered for the rest.
    async fn resolve(&self, urls: HashSet<RelayUrl>) -> Vec<Arc<dyn Relay>> {
        let mut relays: Vec<Arc<dyn Relay>> = Vec::with_capacity(urls.len());

        for url in urls.into_iter() {
            let relay: Option<Arc<dyn Relay>> = match self.pool.relay(&url).await {
                Some(relay) => Some(relay),
                None => match self.pool.add_temporary_relay(&url).await {
                    Ok(relay) => Some(relay),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to register temporary relay.");
                        None
                    }
                },
            };

            if let Some(relay) = relay {
                self.metrics.record_relay_usage(&url);
                relays.push(relay);
            }
        }

        relays
    }
}
