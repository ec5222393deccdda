// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Subscription manager
//!
//! Fans filters out to the relays picked by the router, merges the
//! per-relay streams into one deduplicated output and reacts to late
//! relay-list discoveries by widening live subscriptions.

use std::collections::{BTreeSet, HashMap};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_utility::task;
use futures::Stream;
use outpost::{Event, Filter, PublicKey, RelayUrl, SubscriptionId, Timestamp};
use outpost_pool::{Relay, RelayPool, RelayPoolNotification};
use tokio::sync::broadcast;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::client::Client;
use crate::error::Error;
use crate::metrics::Metrics;
use crate::outbox::RelayListDiscovery;

/// Active subscription handle.
///
/// Yields a deduplicated, order-preserving stream of matching events:
/// cached events first (when a store is configured), then live relay
/// traffic. The stream is unbounded; to restart a subscription, stop it
/// and issue a new one.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Event>,
    relays: Arc<Mutex<HashMap<RelayUrl, Arc<dyn Relay>>>>,
    stop_signal: Arc<Notify>,
}

impl Subscription {
    /// Subscription ID
    #[inline]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Receive the next matching event
    #[inline]
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Urls of the relays currently serving this subscription
    pub async fn relay_urls(&self) -> Vec<RelayUrl> {
        self.relays.lock().await.keys().cloned().collect()
    }

    /// Stop the subscription: close it on every subscribed relay and end
    /// the output stream.
    pub async fn stop(self) {
        self.stop_signal.notify_waiters();

        let relays = self.relays.lock().await;
        for relay in relays.values() {
            if let Err(e) = relay.unsubscribe(&self.id).await {
                tracing::warn!(url = %relay.url(), error = %e, "Failed to close subscription.");
            }
        }
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Per-subscription dedup state.
///
/// First arrival of a logical event wins; for replaceable kinds a newer
/// `created_at` supersedes and is emitted again.
#[derive(Debug, Default)]
struct DedupState {
    seen: HashMap<String, Timestamp>,
}

impl DedupState {
    fn should_emit(&mut self, event: &Event) -> bool {
        let key: String = event.deduplication_key();

        match self.seen.get(&key) {
            None => {
                self.seen.insert(key, event.created_at);
                true
            }
            Some(prev) => {
                let replaceable: bool =
                    event.kind.is_replaceable() || event.kind.is_parameterized_replaceable();
                if replaceable && event.created_at > *prev {
                    self.seen.insert(key, event.created_at);
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl Client {
    /// Subscribe to the given filters.
    ///
    /// Cached events matching the filters are emitted first (when a store
    /// is configured), then the filters are sent to the relays computed by
    /// the relay-set calculator and incoming events are merged into one
    /// deduplicated stream.
    ///
    /// Errors only when not a single relay accepted the request.
    pub async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription, Error> {
        let sub_id: SubscriptionId = SubscriptionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut dedup = DedupState::default();

        // Start listening before any REQ goes out, so no frame can fall
        // into the gap between subscribing and merging
        let notifications = self.pool().notifications();
        let discoveries = self.outbox().subscribe_discoveries();

        // Cached events first
        if let Some(store) = self.store() {
            match store.query(&filters).await {
                Ok(events) => {
                    for event in events.into_iter() {
                        if filters.iter().any(|f| f.match_event(&event))
                            && dedup.should_emit(&event)
                        {
                            let _ = tx.send(event);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to query store."),
            }
        }

        // Fan the filters out to the calculated relay set
        let targets: Vec<Arc<dyn Relay>> = self.router().relays_for_filters(&filters).await;

        let mut subscribed: HashMap<RelayUrl, Arc<dyn Relay>> = HashMap::new();
        for relay in targets.into_iter() {
            match relay.subscribe(sub_id.clone(), filters.clone()).await {
                Ok(()) => {
                    subscribed.insert(relay.url().clone(), relay);
                }
                Err(e) => {
                    tracing::warn!(url = %relay.url(), error = %e, "Subscribe request failed.")
                }
            }
        }

        if subscribed.is_empty() {
            return Err(Error::Pool(outpost_pool::Error::NoRelaysConnected));
        }

        tracing::debug!(id = %sub_id, relays = subscribed.len(), "Subscription created.");

        let relays: Arc<Mutex<HashMap<RelayUrl, Arc<dyn Relay>>>> =
            Arc::new(Mutex::new(subscribed));
        let stop_signal: Arc<Notify> = Arc::new(Notify::new());

        let merger = SubscriptionMerger {
            sub_id: sub_id.clone(),
            filters,
            tx,
            dedup,
            relays: relays.clone(),
            stop_signal: stop_signal.clone(),
            pool: self.pool().clone(),
            metrics: self.metrics().clone(),
            relay_goal_per_author: self.opts().relay_goal_per_author,
        };

        task::spawn(merger.run(notifications, discoveries));

        Ok(Subscription {
            id: sub_id,
            rx,
            relays,
            stop_signal,
        })
    }
}

struct SubscriptionMerger {
    sub_id: SubscriptionId,
    filters: Vec<Filter>,
    tx: mpsc::UnboundedSender<Event>,
    dedup: DedupState,
    relays: Arc<Mutex<HashMap<RelayUrl, Arc<dyn Relay>>>>,
    stop_signal: Arc<Notify>,
    pool: Arc<dyn RelayPool>,
    metrics: Arc<Metrics>,
    relay_goal_per_author: usize,
}

impl SubscriptionMerger {
    async fn run(
        mut self,
        mut notifications: broadcast::Receiver<RelayPoolNotification>,
        mut discoveries: broadcast::Receiver<RelayListDiscovery>,
    ) {
        // Authors this subscription is scoped to, for dynamic relay adds
        let authors: BTreeSet<PublicKey> = self
            .filters
            .iter()
            .flat_map(|f| f.authors.iter().flatten().copied())
            .collect();

        loop {
            tokio::select! {
                _ = self.stop_signal.notified() => break,
                notification = notifications.recv() => {
                    match notification {
                        Ok(RelayPoolNotification::Event { subscription_id, event, .. }) => {
                            if subscription_id != self.sub_id {
                                continue;
                            }

                            if !self.filters.iter().any(|f| f.match_event(&event)) {
                                continue;
                            }

                            // An event with a broken id or signature is
                            // rejected, never surfaced
                            if let Err(e) = event.verify() {
                                tracing::warn!(id = %event.id, error = %e, "Rejecting invalid event.");
                                continue;
                            }

                            if self.dedup.should_emit(&event) {
                                if self.tx.send(*event).is_err() {
                                    // Receiver gone, nothing left to serve
                                    break;
                                }
                            }
                        }
                        Ok(RelayPoolNotification::Shutdown) => break,
                        Ok(..) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(..)) => {}
                    }
                }
                discovery = discoveries.recv() => {
                    match discovery {
                        Ok(discovery) => {
                            if authors.contains(&discovery.public_key) {
                                self.widen(discovery).await;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(..)) => {}
                    }
                }
            }
        }

        tracing::debug!(id = %self.sub_id, "Subscription merger terminated.");
    }

    /// Add newly learned write relays of a covered author to the live
    /// subscription, up to the per-author goal.
    async fn widen(&self, discovery: RelayListDiscovery) {
        let mut relays = self.relays.lock().await;

        let mut count: usize = discovery
            .relay_list
            .write
            .iter()
            .filter(|url| relays.contains_key(*url))
            .count();

        for url in discovery.relay_list.write.iter() {
            if count >= self.relay_goal_per_author {
                break;
            }

            if relays.contains_key(url) {
                continue;
            }

            let relay: Arc<dyn Relay> = match self.pool.relay(url).await {
                Some(relay) => relay,
                None => match self.pool.add_temporary_relay(url).await {
                    Ok(relay) => relay,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to register discovered relay.");
                        continue;
                    }
                },
            };

            match relay
                .subscribe(self.sub_id.clone(), self.filters.clone())
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        id = %self.sub_id,
                        url = %url,
                        public_key = %discovery.public_key,
                        "Added discovered relay to live subscription."
                    );
                    self.metrics.record_relay_added_dynamically();
                    self.metrics.record_relay_usage(url);
                    relays.insert(url.clone(), relay);
                    count += 1;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Subscribe on discovered relay failed.")
                }
            }
        }
    }
}
