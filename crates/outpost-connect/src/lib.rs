// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Remote signer for the outpost engine (NIP46).
//!
//! The signing key lives with a separate party; requests and responses are
//! NIP-04 encrypted kind-24133 events exchanged over the negotiation
//! relays of the external pool.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_utility::time;
use outpost::nips::nip04;
use outpost::nips::nip46::{self, Message, NostrConnectURI, Request};
use outpost::prelude::*;
use outpost::secp256k1::rand::rngs::OsRng;
use outpost::secp256k1::rand::RngCore;
use outpost_pool::{Relay, RelayPool, RelayPoolNotification};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::Receiver;
use tokio::sync::{Notify, OnceCell};

pub mod error;
pub mod prelude;

pub use self::error::Error;

/// Portable descriptor of a remote signer session.
///
/// Holds everything needed to rehydrate the session later: the local
/// ephemeral secret key that encrypts the negotiation channel, the remote
/// signer public key (when already discovered), the negotiation relays and
/// the shared secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSignerDescriptor {
    /// Local ephemeral secret key (hex)
    pub secret_key: String,
    /// Remote signer public key, if already discovered
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub signer_public_key: Option<PublicKey>,
    /// Negotiation relays
    pub relays: Vec<RelayUrl>,
    /// Shared secret
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub secret: Option<String>,
}

/// Remote signer
///
/// A signer whose private key is held by a separate party, reached over
/// relays. Constructed either from a `bunker://` token or through
/// client-initiated discovery (`nostrconnect://` URI displayed to the
/// remote party).
///
/// A signer rehydrated with [`RemoteSigner::from_descriptor`] is
/// *deferred*: it holds no pool handle and every identity or signing call
/// fails with a state error until [`RemoteSigner::init`] is called.
#[derive(Debug)]
pub struct RemoteSigner {
    app_keys: Keys,
    uri: NostrConnectURI,
    signer_public_key: OnceCell<PublicKey>,
    pool: OnceCell<Arc<dyn RelayPool>>,
    timeout: Duration,
    secret: Option<String>,
    sub_id: SubscriptionId,
    bootstrapped: AtomicBool,
    cancel: Notify,
}

impl RemoteSigner {
    /// Construct a remote signer from a connection URI and a live pool handle
    pub fn new(
        uri: NostrConnectURI,
        app_keys: Keys,
        timeout: Duration,
        pool: Arc<dyn RelayPool>,
    ) -> Result<Self, Error> {
        let signer = Self::deferred(uri, app_keys, timeout)?;
        signer.init(pool)?;
        Ok(signer)
    }

    /// Generate a new client-initiated discovery session.
    ///
    /// The [`RemoteSigner::connection_uri`] is meant to be displayed
    /// (usually as a scannable code); the first identity or signing call
    /// then waits, bounded by `timeout`, for the remote party to connect.
    pub fn generate(
        relays: Vec<RelayUrl>,
        app_name: Option<String>,
        timeout: Duration,
        pool: Arc<dyn RelayPool>,
    ) -> Result<Self, Error> {
        let app_keys = Keys::generate();

        let mut os_random = [0u8; 8];
        OsRng.fill_bytes(&mut os_random);
        let secret: String = hex::encode(os_random);

        let uri = NostrConnectURI::Client {
            public_key: app_keys.public_key(),
            relays,
            secret: Some(secret),
            app_name,
        };

        Self::new(uri, app_keys, timeout, pool)
    }

    /// Rehydrate a deferred signer from a portable descriptor.
    ///
    /// The signer holds no pool handle: call [`RemoteSigner::init`] with a
    /// live client handle before use.
    pub fn from_descriptor(
        descriptor: RemoteSignerDescriptor,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let app_keys = Keys::parse(&descriptor.secret_key)?;

        let uri: NostrConnectURI = match descriptor.signer_public_key {
            Some(signer_public_key) => NostrConnectURI::Bunker {
                signer_public_key,
                relays: descriptor.relays,
                secret: descriptor.secret,
            },
            None => NostrConnectURI::Client {
                public_key: app_keys.public_key(),
                relays: descriptor.relays,
                secret: descriptor.secret,
                app_name: None,
            },
        };

        Self::deferred(uri, app_keys, timeout)
    }

    fn deferred(uri: NostrConnectURI, app_keys: Keys, timeout: Duration) -> Result<Self, Error> {
        if let NostrConnectURI::Client { public_key, .. } = &uri {
            if *public_key != app_keys.public_key() {
                return Err(Error::PublicKeyNotMatchAppKeys);
            }
        }

        let signer_public_key: OnceCell<PublicKey> =
            OnceCell::new_with(uri.signer_public_key());

        Ok(Self {
            app_keys,
            secret: uri.secret().map(|s| s.to_string()),
            uri,
            signer_public_key,
            pool: OnceCell::new(),
            timeout,
            sub_id: SubscriptionId::generate(),
            bootstrapped: AtomicBool::new(false),
            cancel: Notify::new(),
        })
    }

    /// Initialize a deferred signer with a live pool handle
    pub fn init(&self, pool: Arc<dyn RelayPool>) -> Result<(), Error> {
        self.pool.set(pool).map_err(|_| Error::AlreadyInitialized)
    }

    /// Check if the signer holds a pool handle
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    fn pool(&self) -> Result<&Arc<dyn RelayPool>, Error> {
        self.pool.get().ok_or(Error::NotInitialized)
    }

    /// Get the connection URI of this session
    #[inline]
    pub fn connection_uri(&self) -> &NostrConnectURI {
        &self.uri
    }

    /// Get the local ephemeral keys encrypting the negotiation channel
    #[inline]
    pub fn local_keys(&self) -> &Keys {
        &self.app_keys
    }

    /// Get the negotiation relays
    #[inline]
    pub fn relays(&self) -> &[RelayUrl] {
        self.uri.relays()
    }

    /// Serialize the session to a portable descriptor
    pub fn to_descriptor(&self) -> Result<RemoteSignerDescriptor, Error> {
        Ok(RemoteSignerDescriptor {
            secret_key: self.app_keys.secret_key()?.display_secret().to_string(),
            signer_public_key: self.signer_public_key.get().copied(),
            relays: self.uri.relays().to_vec(),
            secret: self.secret.clone(),
        })
    }

    /// Get the remote signer public key, bootstrapping the session if needed.
    ///
    /// For a `bunker://` session the key is already known and no wait
    /// happens here; the handshake runs lazily on the first request. For a
    /// discovery session this waits, bounded by the configured timeout, for
    /// the remote party to connect.
    pub async fn signer_public_key(&self) -> Result<PublicKey, Error> {
        // Deferred and not yet initialized: fail fast, don't block
        let _ = self.pool()?;

        let public_key: &PublicKey = self
            .signer_public_key
            .get_or_try_init(|| async { self.bootstrap().await })
            .await?;

        Ok(*public_key)
    }

    /// Cancel the negotiation session.
    ///
    /// Stops any in-flight wait, releases the listener subscription on the
    /// negotiation relays and transitions the session back to not
    /// connected. A later request bootstraps again.
    pub async fn cancel(&self) {
        self.cancel.notify_waiters();
        self.bootstrapped.store(false, Ordering::SeqCst);

        if let Ok(pool) = self.pool() {
            for url in self.uri.relays() {
                if let Some(relay) = pool.relay(url).await {
                    if let Err(e) = relay.unsubscribe(&self.sub_id).await {
                        tracing::warn!(url = %url, error = %e, "Failed to release listener.");
                    }
                }
            }
        }
    }

    async fn bootstrap(&self) -> Result<PublicKey, Error> {
        let pool: &Arc<dyn RelayPool> = self.pool()?;

        // Make sure the negotiation relays are available in the pool
        let mut relays: Vec<Arc<dyn Relay>> = Vec::with_capacity(self.uri.relays().len());
        for url in self.uri.relays() {
            relays.push(pool.add_temporary_relay(url).await?);
        }

        if relays.is_empty() {
            return Err(Error::Pool(outpost_pool::Error::NoRelaysConnected));
        }

        let notifications = pool.notifications();

        // Listen for encrypted messages addressed to the app key
        let filter: Filter = Filter::new()
            .pubkey(self.app_keys.public_key())
            .kind(Kind::NOSTR_CONNECT)
            .limit(0);
        for relay in relays.iter() {
            relay.subscribe(self.sub_id.clone(), vec![filter.clone()]).await?;
        }

        let signer_public_key: PublicKey = match self.uri.signer_public_key() {
            Some(public_key) => public_key,
            None => self.wait_for_remote_party(notifications).await?,
        };

        // Send the `connect` command if this is a bunker session
        if self.uri.is_bunker() {
            self.connect(signer_public_key).await?;
        }

        self.bootstrapped.store(true, Ordering::SeqCst);

        Ok(signer_public_key)
    }

    async fn wait_for_remote_party(
        &self,
        mut notifications: Receiver<RelayPoolNotification>,
    ) -> Result<PublicKey, Error> {
        let secret_key: SecretKey = self.app_keys.secret_key()?;

        time::timeout(Some(self.timeout), async {
            loop {
                tokio::select! {
                    _ = self.cancel.notified() => return Err(Error::Cancelled),
                    notification = notifications.recv() => {
                        let Ok(notification) = notification else {
                            return Err(Error::Timeout);
                        };

                        let RelayPoolNotification::Event { event, .. } = notification else {
                            continue;
                        };

                        if event.kind != Kind::NOSTR_CONNECT {
                            continue;
                        }

                        // Messages not encrypted to us are not ours to read
                        let Ok(decrypted) = nip04::decrypt(&secret_key, &event.pubkey, &event.content) else {
                            continue;
                        };

                        let Ok(msg) = Message::from_json(decrypted) else {
                            continue;
                        };

                        match msg {
                            Message::Request {
                                req: Request::Connect { secret, .. },
                                ..
                            } => {
                                // A connect carrying the wrong secret is not our party
                                if self.secret.is_some() && secret != self.secret {
                                    tracing::warn!("Ignoring connect with mismatching secret.");
                                    continue;
                                }
                                return Ok(event.pubkey);
                            }
                            Message::Response { result: Some(result), error: None, .. } => {
                                if self.secret.is_none()
                                    || result == "ack"
                                    || Some(&result) == self.secret.as_ref()
                                {
                                    return Ok(event.pubkey);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        })
        .await
        .ok_or(Error::Timeout)?
    }

    async fn connect(&self, signer_public_key: PublicKey) -> Result<(), Error> {
        let req = Request::Connect {
            public_key: signer_public_key,
            secret: self.secret.clone(),
        };
        self.send_request_with_pk(req, signer_public_key).await?;
        Ok(())
    }

    async fn send_request(&self, req: Request) -> Result<String, Error> {
        let signer_public_key: PublicKey = self.signer_public_key().await?;

        // The session may have been cancelled since the last request
        if !self.bootstrapped.load(Ordering::SeqCst) {
            self.bootstrap().await?;
        }

        self.send_request_with_pk(req, signer_public_key).await
    }

    async fn send_request_with_pk(
        &self,
        req: Request,
        signer_public_key: PublicKey,
    ) -> Result<String, Error> {
        let pool: &Arc<dyn RelayPool> = self.pool()?;
        let secret_key: SecretKey = self.app_keys.secret_key()?;

        let msg: Message = Message::request(req);
        let req_id: String = msg.id().to_string();

        tracing::debug!(id = %req_id, "Sending NIP46 request.");

        // Wrap the encrypted request into a kind-24133 event
        let content: String = nip04::encrypt(&secret_key, &signer_public_key, msg.as_json())?;
        let tags: Tags = Tags::new(vec![Tag::public_key(signer_public_key)]);
        let event: Event = UnsignedEvent::new(
            self.app_keys.public_key(),
            Timestamp::now(),
            Kind::NOSTR_CONNECT,
            tags,
            content,
        )
        .sign(&self.app_keys)?;

        let mut notifications = pool.notifications();

        // One send per negotiation relay. Delivery is the relay's concern:
        // a single request is never retried here, failure or timeout is
        // surfaced to the caller.
        let mut sent: bool = false;
        for url in self.uri.relays() {
            if let Some(relay) = pool.relay(url).await {
                match relay.send_event(&event).await {
                    Ok(()) => sent = true,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to send NIP46 request.")
                    }
                }
            }
        }

        if !sent {
            return Err(Error::Pool(outpost_pool::Error::NoRelaysConnected));
        }

        time::timeout(Some(self.timeout), async {
            loop {
                tokio::select! {
                    _ = self.cancel.notified() => return Err(Error::Cancelled),
                    notification = notifications.recv() => {
                        let Ok(notification) = notification else {
                            return Err(Error::Timeout);
                        };

                        let RelayPoolNotification::Event { event, .. } = notification else {
                            continue;
                        };

                        if event.kind != Kind::NOSTR_CONNECT || event.pubkey != signer_public_key {
                            continue;
                        }

                        let decrypted: String =
                            nip04::decrypt(&secret_key, &event.pubkey, &event.content)?;
                        let msg: Message = Message::from_json(decrypted)?;

                        tracing::debug!(id = %msg.id(), "Received NIP46 message.");

                        if let Message::Response { id, result, error } = msg {
                            if id != req_id {
                                continue;
                            }

                            if let Some(error) = error {
                                return Err(Error::Response(error));
                            }

                            return result.ok_or(Error::Response(String::from("empty response")));
                        }
                    }
                }
            }
        })
        .await
        .ok_or(Error::Timeout)?
    }

    async fn sign_event_request(&self, unsigned: UnsignedEvent) -> Result<Event, Error> {
        let result: String = self
            .send_request(Request::SignEvent(Box::new(unsigned)))
            .await?;
        let event: Event = nip46::event_from_result(&result)?;
        event.verify()?;
        Ok(event)
    }
}

impl NostrSigner for RemoteSigner {
    fn backend(&self) -> SignerBackend {
        SignerBackend::NostrConnect
    }

    fn get_public_key(&self) -> BoxedFuture<Result<PublicKey, SignerError>> {
        Box::pin(async move {
            self.signer_public_key()
                .await
                .map_err(SignerError::backend)
        })
    }

    fn sign_event(&self, unsigned: UnsignedEvent) -> BoxedFuture<Result<Event, SignerError>> {
        Box::pin(async move {
            self.sign_event_request(unsigned)
                .await
                .map_err(SignerError::backend)
        })
    }

    fn nip04_encrypt<'a>(
        &'a self,
        public_key: &'a PublicKey,
        content: &'a str,
    ) -> BoxedFuture<'a, Result<String, SignerError>> {
        Box::pin(async move {
            self.send_request(Request::Nip04Encrypt {
                public_key: *public_key,
                text: content.to_string(),
            })
            .await
            .map_err(SignerError::backend)
        })
    }

    fn nip04_decrypt<'a>(
        &'a self,
        public_key: &'a PublicKey,
        encrypted_content: &'a str,
    ) -> BoxedFuture<'a, Result<String, SignerError>> {
        Box::pin(async move {
            self.send_request(Request::Nip04Decrypt {
                public_key: *public_key,
                ciphertext: encrypted_content.to_string(),
            })
            .await
            .map_err(SignerError::backend)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use outpost::util::BoxedFuture;
    use outpost_pool::RelayStatus;
    use tokio::sync::broadcast;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Pool that plays the remote signer side: every NIP46 request sent
    /// through it is answered immediately on the notification channel.
    #[derive(Debug, Clone)]
    struct MockSignerPool {
        signer_keys: Keys,
        url: RelayUrl,
        tx: broadcast::Sender<RelayPoolNotification>,
    }

    impl MockSignerPool {
        fn new(signer_keys: Keys) -> Self {
            let (tx, _) = broadcast::channel(64);
            Self {
                signer_keys,
                url: RelayUrl::parse("wss://relay.nsec.app").unwrap(),
                tx,
            }
        }
    }

    impl RelayPool for MockSignerPool {
        fn available_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
            let url = self.url.clone();
            Box::pin(async move { HashSet::from([url]) })
        }

        fn connected_relays(&self) -> BoxedFuture<HashSet<RelayUrl>> {
            self.available_relays()
        }

        fn relay<'a>(
            &'a self,
            _url: &'a RelayUrl,
        ) -> BoxedFuture<'a, Option<Arc<dyn Relay>>> {
            Box::pin(async move {
                Some(Arc::new(MockRelay { pool: self.clone() }) as Arc<dyn Relay>)
            })
        }

        fn add_temporary_relay<'a>(
            &'a self,
            _url: &'a RelayUrl,
        ) -> BoxedFuture<'a, Result<Arc<dyn Relay>, outpost_pool::Error>> {
            Box::pin(async move {
                Ok(Arc::new(MockRelay { pool: self.clone() }) as Arc<dyn Relay>)
            })
        }

        fn notifications(&self) -> broadcast::Receiver<RelayPoolNotification> {
            self.tx.subscribe()
        }
    }

    #[derive(Debug)]
    struct MockRelay {
        pool: MockSignerPool,
    }

    impl Relay for MockRelay {
        fn url(&self) -> &RelayUrl {
            &self.pool.url
        }

        fn status(&self) -> RelayStatus {
            RelayStatus::Connected
        }

        fn subscribe<'a>(
            &'a self,
            _id: SubscriptionId,
            _filters: Vec<Filter>,
        ) -> BoxedFuture<'a, Result<(), outpost_pool::Error>> {
            Box::pin(async move { Ok(()) })
        }

        fn unsubscribe<'a>(
            &'a self,
            _id: &'a SubscriptionId,
        ) -> BoxedFuture<'a, Result<(), outpost_pool::Error>> {
            Box::pin(async move { Ok(()) })
        }

        fn send_event<'a>(
            &'a self,
            event: &'a Event,
        ) -> BoxedFuture<'a, Result<(), outpost_pool::Error>> {
            Box::pin(async move {
                let keys = &self.pool.signer_keys;
                let secret_key = keys.secret_key().map_err(outpost_pool::Error::backend)?;

                let decrypted = nip04::decrypt(&secret_key, &event.pubkey, &event.content)
                    .map_err(outpost_pool::Error::backend)?;
                let msg = Message::from_json(decrypted).map_err(outpost_pool::Error::backend)?;

                let Message::Request { id, req } = msg else {
                    return Ok(());
                };

                let result: String = match req {
                    Request::Connect { .. } => String::from("ack"),
                    Request::GetPublicKey => keys.public_key().to_hex(),
                    Request::SignEvent(unsigned) => {
                        let signed = unsigned
                            .sign(keys)
                            .map_err(outpost_pool::Error::backend)?;
                        signed.as_json()
                    }
                    Request::Ping => String::from("pong"),
                    _ => return Ok(()),
                };

                let response = Message::Response {
                    id,
                    result: Some(result),
                    error: None,
                };
                let content = nip04::encrypt(&secret_key, &event.pubkey, response.as_json())
                    .map_err(outpost_pool::Error::backend)?;
                let resp_event = UnsignedEvent::new(
                    keys.public_key(),
                    Timestamp::now(),
                    Kind::NOSTR_CONNECT,
                    Tags::new(vec![Tag::public_key(event.pubkey)]),
                    content,
                )
                .sign(keys)
                .map_err(outpost_pool::Error::backend)?;

                let _ = self.pool.tx.send(RelayPoolNotification::Event {
                    relay_url: self.pool.url.clone(),
                    subscription_id: SubscriptionId::new("mock"),
                    event: Box::new(resp_event),
                });

                Ok(())
            })
        }
    }

    fn bunker_signer(signer_keys: &Keys, pool: &MockSignerPool) -> RemoteSigner {
        let uri = NostrConnectURI::Bunker {
            signer_public_key: signer_keys.public_key(),
            relays: vec![pool.url.clone()],
            secret: None,
        };
        RemoteSigner::new(uri, Keys::generate(), TIMEOUT, Arc::new(pool.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_remote_sign_round_trip() {
        let signer_keys = Keys::generate();
        let pool = MockSignerPool::new(signer_keys.clone());
        let signer = bunker_signer(&signer_keys, &pool);

        assert_eq!(
            signer.signer_public_key().await.unwrap(),
            signer_keys.public_key()
        );

        let unsigned = UnsignedEvent::new(
            signer_keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::TEXT_NOTE,
            Tags::default(),
            "signed remotely",
        );

        let event = signer.sign_event_request(unsigned).await.unwrap();
        event.verify().unwrap();
        assert_eq!(event.pubkey, signer_keys.public_key());
    }

    #[tokio::test]
    async fn test_descriptor_round_trip() {
        let signer_keys = Keys::generate();
        let pool = MockSignerPool::new(signer_keys.clone());
        let signer = bunker_signer(&signer_keys, &pool);

        let original_pubkey = signer.signer_public_key().await.unwrap();

        // Serialize and rehydrate as a deferred signer
        let descriptor = signer.to_descriptor().unwrap();
        let json = serde_json::to_string(&descriptor).unwrap();
        let descriptor: RemoteSignerDescriptor = serde_json::from_str(&json).unwrap();
        let deferred = RemoteSigner::from_descriptor(descriptor, TIMEOUT).unwrap();

        // Uninitialized: identity and signing fail fast with a state error
        assert!(!deferred.is_initialized());
        assert!(matches!(
            deferred.signer_public_key().await.unwrap_err(),
            Error::NotInitialized
        ));
        let unsigned = UnsignedEvent::new(
            signer_keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::TEXT_NOTE,
            Tags::default(),
            "too early",
        );
        assert!(deferred.sign_event_request(unsigned).await.is_err());

        // Initialized: the identity matches the original
        deferred.init(Arc::new(pool.clone())).unwrap();
        assert_eq!(deferred.signer_public_key().await.unwrap(), original_pubkey);

        // Double init is rejected
        assert!(matches!(
            deferred.init(Arc::new(pool)).unwrap_err(),
            Error::AlreadyInitialized
        ));
    }

    #[tokio::test]
    async fn test_client_uri_mismatching_keys_rejected() {
        let uri = NostrConnectURI::Client {
            public_key: Keys::generate().public_key(),
            relays: vec![RelayUrl::parse("wss://relay.nsec.app").unwrap()],
            secret: None,
            app_name: None,
        };
        let pool = MockSignerPool::new(Keys::generate());

        assert!(matches!(
            RemoteSigner::new(uri, Keys::generate(), TIMEOUT, Arc::new(pool)).unwrap_err(),
            Error::PublicKeyNotMatchAppKeys
        ));
    }

    #[tokio::test]
    async fn test_cancel_leaves_session_unconnected() {
        // A discovery session against a pool where nobody answers
        let pool = MockSignerPool::new(Keys::generate());
        let signer = RemoteSigner::generate(
            vec![pool.url.clone()],
            Some(String::from("Example")),
            Duration::from_secs(30),
            Arc::new(pool),
        )
        .unwrap();

        assert!(signer.connection_uri().to_string().starts_with("nostrconnect://"));

        let handle = {
            let signer = Arc::new(signer);
            let waiting = signer.clone();
            let handle = tokio::spawn(async move { waiting.signer_public_key().await });

            // Give the wait a chance to start, then cancel it
            tokio::time::sleep(Duration::from_millis(100)).await;
            signer.cancel().await;
            handle
        };

        let result = handle.await.unwrap();
        assert!(matches!(result.unwrap_err(), Error::Cancelled));
    }
}
