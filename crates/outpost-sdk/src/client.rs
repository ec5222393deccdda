// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Client

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use outpost::nips::nip65::RelayList;
use outpost::signer::IntoNostrSigner;
use outpost::{Event, NostrSigner, PublicKey, RelayUrl, UnsignedEvent};
use outpost_pool::{Relay, RelayPool};
use tokio::sync::RwLock;

use crate::error::Error;
use crate::metrics::Metrics;
use crate::options::Options;
use crate::outbox::OutboxTracker;
use crate::router::RelayRouter;
use crate::store::EventStore;

/// Client engine
///
/// Ties the outbox tracker, the relay-set calculator and the subscription
/// manager together around an external relay pool and an optional event
/// store. Cheap to clone; the metrics instance lives and dies with it.
#[derive(Debug, Clone)]
pub struct Client {
    pool: Arc<dyn RelayPool>,
    store: Option<Arc<dyn EventStore>>,
    signer: Arc<RwLock<Option<Arc<dyn NostrSigner>>>>,
    tracker: Arc<OutboxTracker>,
    router: Arc<RelayRouter>,
    metrics: Arc<Metrics>,
    opts: Options,
}

impl Client {
    /// New client with default options
    pub fn new<P>(pool: P) -> Self
    where
        P: RelayPool + 'static,
    {
        Self::builder(pool).build()
    }

    /// New client builder
    pub fn builder<P>(pool: P) -> ClientBuilder
    where
        P: RelayPool + 'static,
    {
        ClientBuilder::new(pool)
    }

    /// Get the relay pool handle.
    ///
    /// This is the "live client handle" a deferred remote signer is
    /// initialized with.
    #[inline]
    pub fn pool(&self) -> &Arc<dyn RelayPool> {
        &self.pool
    }

    /// Get the event store, if configured
    #[inline]
    pub fn store(&self) -> Option<&Arc<dyn EventStore>> {
        self.store.as_ref()
    }

    /// Get the outbox tracker
    #[inline]
    pub fn outbox(&self) -> &Arc<OutboxTracker> {
        &self.tracker
    }

    /// Get the relay-set calculator
    #[inline]
    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Get the metrics instance
    #[inline]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Get the options
    #[inline]
    pub fn opts(&self) -> &Options {
        &self.opts
    }

    /// Set or replace the signer
    pub async fn set_signer<S>(&self, signer: S)
    where
        S: IntoNostrSigner,
    {
        let mut slot = self.signer.write().await;
        *slot = Some(signer.into_nostr_signer());
    }

    /// Unset the signer
    pub async fn unset_signer(&self) {
        let mut slot = self.signer.write().await;
        *slot = None;
    }

    /// Get the configured signer
    pub async fn signer(&self) -> Result<Arc<dyn NostrSigner>, Error> {
        let slot = self.signer.read().await;
        slot.clone().ok_or(Error::SignerNotConfigured)
    }

    /// Sign an event draft with the configured signer
    pub async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, Error> {
        let signer = self.signer().await?;
        Ok(signer.sign_event(unsigned).await?)
    }

    /// Cache-only lookup of an author's relay list
    #[inline]
    pub async fn relay_list(&self, public_key: &PublicKey) -> Option<RelayList> {
        self.tracker.relay_list(public_key).await
    }

    /// Get an author's relay list, fetching it when not cached.
    ///
    /// Bounded by the configured fetch timeout; `None` is the normal
    /// outcome for an author without a known list.
    #[inline]
    pub async fn fetch_relay_list(&self, public_key: PublicKey) -> Option<RelayList> {
        self.tracker
            .fetch_relay_list(public_key, self.opts.relay_list_fetch_timeout)
            .await
    }

    /// Same as [`Client::fetch_relay_list`] with an explicit timeout
    #[inline]
    pub async fn fetch_relay_list_with_timeout(
        &self,
        public_key: PublicKey,
        timeout: Duration,
    ) -> Option<RelayList> {
        self.tracker.fetch_relay_list(public_key, timeout).await
    }

    /// Publish a signed event.
    ///
    /// The event is verified and persisted, then sent to the author's
    /// declared write relays when outbox routing knows them, to every
    /// connected relay otherwise. Individual relay failures are absorbed;
    /// only a total absence of reachable relays is an error. Returns how
    /// many relays accepted the send.
    pub async fn publish(&self, event: &Event) -> Result<usize, Error> {
        event.verify()?;

        if let Some(store) = &self.store {
            store.store_event(event).await?;
        }

        let mut urls: HashSet<RelayUrl> = HashSet::new();
        if self.opts.outbox {
            if let Some(list) = self.tracker.relay_list(&event.pubkey).await {
                urls.extend(list.write);
            }
        }

        if urls.is_empty() {
            urls = self.pool.connected_relays().await;
        }

        if urls.is_empty() {
            return Err(Error::Pool(outpost_pool::Error::NoRelaysConnected));
        }

        let mut sent: usize = 0;
        for url in urls.into_iter() {
            let relay: Arc<dyn Relay> = match self.pool.relay(&url).await {
                Some(relay) => relay,
                None => match self.pool.add_temporary_relay(&url).await {
                    Ok(relay) => relay,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to register relay.");
                        continue;
                    }
                },
            };

            match relay.send_event(event).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(url = %url, error = %e, "Failed to send event."),
            }
        }

        if sent == 0 {
            return Err(Error::Pool(outpost_pool::Error::NoRelaysConnected));
        }

        Ok(sent)
    }

    /// Sign an event draft and publish it
    pub async fn sign_and_publish(&self, unsigned: UnsignedEvent) -> Result<Event, Error> {
        let event: Event = self.sign_event(unsigned).await?;
        self.publish(&event).await?;
        Ok(event)
    }
}

/// Client builder
pub struct ClientBuilder {
    pool: Arc<dyn RelayPool>,
    store: Option<Arc<dyn EventStore>>,
    signer: Option<Arc<dyn NostrSigner>>,
    opts: Options,
}

impl ClientBuilder {
    /// New builder around a relay pool
    pub fn new<P>(pool: P) -> Self
    where
        P: RelayPool + 'static,
    {
        Self {
            pool: Arc::new(pool),
            store: None,
            signer: None,
            opts: Options::default(),
        }
    }

    /// Set the event store
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: EventStore + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the signer
    pub fn signer<S>(mut self, signer: S) -> Self
    where
        S: IntoNostrSigner,
    {
        self.signer = Some(signer.into_nostr_signer());
        self
    }

    /// Set the options
    pub fn opts(mut self, opts: Options) -> Self {
        self.opts = opts;
        self
    }

    /// Build the client
    pub fn build(self) -> Client {
        let metrics: Arc<Metrics> = Arc::new(Metrics::new());

        let tracker: Arc<OutboxTracker> = Arc::new(OutboxTracker::new(
            self.pool.clone(),
            self.store.clone(),
            metrics.clone(),
            &self.opts,
        ));

        let router: Arc<RelayRouter> = Arc::new(RelayRouter::new(
            self.pool.clone(),
            tracker.clone(),
            metrics.clone(),
            self.opts.clone(),
        ));

        Client {
            pool: self.pool,
            store: self.store,
            signer: Arc::new(RwLock::new(self.signer)),
            tracker,
            router,
            metrics,
            opts: self.opts,
        }
    }
}
