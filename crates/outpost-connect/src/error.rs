// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Remote signer error

use outpost::event;
use outpost::key;
use outpost::nips::nip04;
use outpost::nips::nip46;
use thiserror::Error;

/// Remote signer error
#[derive(Debug, Error)]
pub enum Error {
    /// Event error
    #[error(transparent)]
    Event(#[from] event::Error),
    /// Key error
    #[error(transparent)]
    Key(#[from] key::Error),
    /// NIP04 error
    #[error(transparent)]
    NIP04(#[from] nip04::Error),
    /// NIP46 error
    #[error(transparent)]
    NIP46(#[from] nip46::Error),
    /// Pool error
    #[error(transparent)]
    Pool(#[from] outpost_pool::Error),
    /// The remote party answered with an error
    #[error("response error: {0}")]
    Response(String),
    /// The URI public key doesn't match the app keys
    #[error("public key not match app keys")]
    PublicKeyNotMatchAppKeys,
    /// The remote signer public key was not found
    #[error("signer public key not found")]
    SignerPublicKeyNotFound,
    /// The negotiation secret doesn't match
    #[error("secret not match")]
    SecretNotMatch,
    /// The wait for the remote party ended without a response
    #[error("timeout")]
    Timeout,
    /// The negotiation was cancelled by the caller
    #[error("cancelled")]
    Cancelled,
    /// The signer was deserialized but not yet initialized with a client handle
    #[error("remote signer not initialized: call init() with a live client handle")]
    NotInitialized,
    /// The signer is already initialized
    #[error("remote signer already initialized")]
    AlreadyInitialized,
}
