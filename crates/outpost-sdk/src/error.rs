// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Engine error

use core::fmt;

use outpost::nips::nip65;
use outpost::signer::SignerError;
use outpost::event;

use crate::store::StoreError;

/// Engine error
#[derive(Debug)]
pub enum Error {
    /// Event error
    Event(event::Error),
    /// Relay list error
    RelayList(nip65::Error),
    /// Signer error
    Signer(SignerError),
    /// No signer configured
    SignerNotConfigured,
    /// Pool error
    Pool(outpost_pool::Error),
    /// Store error
    Store(StoreError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(e) => write!(f, "Event: {e}"),
            Self::RelayList(e) => write!(f, "Relay list: {e}"),
            Self::Signer(e) => write!(f, "Signer: {e}"),
            Self::SignerNotConfigured => write!(f, "No signer configured"),
            Self::Pool(e) => write!(f, "Pool: {e}"),
            Self::Store(e) => write!(f, "Store: {e}"),
        }
    }
}

impl From<event::Error> for Error {
    fn from(e: event::Error) -> Self {
        Self::Event(e)
    }
}

impl From<nip65::Error> for Error {
    fn from(e: nip65::Error) -> Self {
        Self::RelayList(e)
    }
}

impl From<SignerError> for Error {
    fn from(e: SignerError) -> Self {
        Self::Signer(e)
    }
}

impl From<outpost_pool::Error> for Error {
    fn from(e: outpost_pool::Error) -> Self {
        Self::Pool(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
