// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Test doubles standing in for the external pool and store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use outpost::nips::nip65::RelayMetadata;
use outpost::util::BoxedFuture;
use outpost::{
    Event, Filter, Keys, Kind, PublicKey, RelayUrl, SubscriptionId, Tag, Tags, Timestamp,
    UnsignedEvent,
};
use outpost_pool::{Error as PoolError, Relay, RelayPool, RelayPoolNotification, RelayStatus};
use tokio::sync::broadcast;

use crate::store::{EventStore, StoreError};

#[derive(Debug, Clone)]
pub(crate) struct MockPool {
    inner: Arc<MockPoolInner>,
}

#[derive(Debug)]
struct MockPoolInner {
    tx: broadcast::Sender<RelayPoolNotification>,
    relays: Mutex<HashMap<RelayUrl, Arc<MockRelay>>>,
    connected: Mutex<HashSet<RelayUrl>>,
}

impl MockPool {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(MockPoolInner {
                tx,
                relays: Mutex::new(HashMap::new()),
                connected: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub(crate) fn add_relay(&self, url: &str, connected: bool) -> Arc<MockRelay> {
        let url: RelayUrl = RelayUrl::parse(url).unwrap();
        let relay = Arc::new(MockRelay {
            url: url.clone(),
            subscriptions: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        });
        self.inner
            .relays
            .lock()
            .unwrap()
            .insert(url.clone(), relay.clone());
        if connected {
            self.inner.connected.lock().unwrap().insert(url);
        }
        relay
    }

    pub(crate) fn relay_handle(&self, url: &RelayUrl) -> Option<Arc<MockRelay>> {
        self.inner.relays.lock().unwrap().get(url).cloned()
    }

    pub(crate) fn emit(&self, relay_url: &RelayUrl, subscription_id: SubscriptionId, event: Event) {
        let _ = self.inner.tx.send(RelayPoolNotification::Event {
            relay_url: relay_url.clone(),
            subscription_id,
            event: Box::new(event),
        });
    }
}

impl RelayPool for MockPool {
    fn available_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
        let urls: HashSet<RelayUrl> = self.inner.relays.lock().unwrap().keys().cloned().collect();
        Box::pin(async move { urls })
    }

    fn connected_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
        let urls: HashSet<RelayUrl> = self.inner.connected.lock().unwrap().clone();
        Box::pin(async move { urls })
    }

    fn relay<'a>(&'a self, url: &'a RelayUrl) -> BoxedFuture<'a, Option<Arc<dyn Relay>>> {
        let relay = self
            .inner
            .relays
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .map(|r| r as Arc<dyn Relay>);
        Box::pin(async move { relay })
    }

    fn add_temporary_relay<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<Arc<dyn Relay>, PoolError>> {
        let mut relays = self.inner.relays.lock().unwrap();
        let relay = relays
            .entry(url.clone())
            .or_insert_with(|| {
                Arc::new(MockRelay {
                    url: url.clone(),
                    subscriptions: Mutex::new(HashMap::new()),
                    sent: Mutex::new(Vec::new()),
                })
            })
            .clone();
        Box::pin(async move { Ok(relay as Arc<dyn Relay>) })
    }

    fn notifications(&self) -> broadcast::Receiver<RelayPoolNotification> {
        self.inner.tx.subscribe()
    }
}

#[derive(Debug)]
pub(crate) struct MockRelay {
    url: RelayUrl,
    pub(crate) subscriptions: Mutex<HashMap<SubscriptionId, Vec<Filter>>>,
    pub(crate) sent: Mutex<Vec<Event>>,
}

impl MockRelay {
    pub(crate) fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.lock().unwrap().keys().cloned().collect()
    }
}

impl Relay for MockRelay {
    fn url(&self) -> &RelayUrl {
        &self.url
    }

    fn status(&self) -> RelayStatus {
        RelayStatus::Connected
    }

    fn subscribe<'a>(
        &'a self,
        id: SubscriptionId,
        filters: Vec<Filter>,
    ) -> BoxedFuture<'a, Result<(), PoolError>> {
        self.subscriptions.lock().unwrap().insert(id, filters);
        Box::pin(async move { Ok(()) })
    }

    fn unsubscribe<'a>(&'a self, id: &'a SubscriptionId) -> BoxedFuture<'a, Result<(), PoolError>> {
        self.subscriptions.lock().unwrap().remove(id);
        Box::pin(async move { Ok(()) })
    }

    fn send_event<'a>(&'a self, event: &'a Event) -> BoxedFuture<'a, Result<(), PoolError>> {
        self.sent.lock().unwrap().push(event.clone());
        Box::pin(async move { Ok(()) })
    }
}

/// Store backed by a fixed list of events
#[derive(Debug, Default)]
pub(crate) struct MockStore {
    pub(crate) events: Mutex<Vec<Event>>,
}

impl MockStore {
    pub(crate) fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

impl EventStore for MockStore {
    fn store_event<'a>(&'a self, event: &'a Event) -> BoxedFuture<'a, Result<(), StoreError>> {
        self.events.lock().unwrap().push(event.clone());
        Box::pin(async move { Ok(()) })
    }

    fn relay_list_event<'a>(
        &'a self,
        public_key: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Option<Event>, StoreError>> {
        let event: Option<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == Kind::RELAY_LIST && &e.pubkey == public_key)
            .max_by_key(|e| e.created_at)
            .cloned();
        Box::pin(async move { Ok(event) })
    }

    fn query<'a>(
        &'a self,
        filters: &'a [Filter],
    ) -> BoxedFuture<'a, Result<Vec<Event>, StoreError>> {
        let events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filters.iter().any(|f| f.match_event(e)))
            .cloned()
            .collect();
        Box::pin(async move { Ok(events) })
    }
}

pub(crate) fn relay_list_event(
    keys: &Keys,
    relays: &[(&str, Option<RelayMetadata>)],
    created_at: u64,
) -> Event {
    let tags: Tags = relays
        .iter()
        .map(|(url, metadata)| Tag::relay_metadata(&RelayUrl::parse(url).unwrap(), *metadata))
        .collect();
    UnsignedEvent::new(
        keys.public_key(),
        Timestamp::from(created_at),
        Kind::RELAY_LIST,
        tags,
        "",
    )
    .sign(keys)
    .unwrap()
}

pub(crate) fn text_note(keys: &Keys, content: &str, created_at: u64) -> Event {
    UnsignedEvent::new(
        keys.public_key(),
        Timestamp::from(created_at),
        Kind::TEXT_NOTE,
        Tags::default(),
        content,
    )
    .sign(keys)
    .unwrap()
}

pub(crate) fn replaceable_note(keys: &Keys, kind: Kind, content: &str, created_at: u64) -> Event {
    UnsignedEvent::new(
        keys.public_key(),
        Timestamp::from(created_at),
        kind,
        Tags::default(),
        content,
    )
    .sign(keys)
    .unwrap()
}
