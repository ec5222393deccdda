// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Event store interface
//!
//! The on-device storage engine is an external collaborator; the engine
//! only relies on this surface.

use core::fmt;

use outpost::util::BoxedFuture;
use outpost::{Event, Filter, PublicKey};

/// Store error
#[derive(Debug)]
pub enum StoreError {
    /// An error happened in the underlying storage backend
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => e.fmt(f),
        }
    }
}

impl StoreError {
    /// Create a new backend error
    ///
    /// Shorthand for `StoreError::Backend(Box::new(error))`.
    #[inline]
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}

/// Event store consumed by the engine
pub trait EventStore: fmt::Debug + Send + Sync {
    /// Persist an event
    fn store_event<'a>(&'a self, event: &'a Event) -> BoxedFuture<'a, Result<(), StoreError>>;

    /// Get the stored relay list event (kind 10002) of an author, if any
    fn relay_list_event<'a>(
        &'a self,
        public_key: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Option<Event>, StoreError>>;

    /// Query stored events matching any of the filters
    fn query<'a>(
        &'a self,
        filters: &'a [Filter],
    ) -> BoxedFuture<'a, Result<Vec<Event>, StoreError>>;
}
