// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Nostr protocol core for the outpost engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub use secp256k1;
pub use url;

pub mod event;
pub mod filter;
pub mod key;
pub mod message;
pub mod nips;
pub mod prelude;
pub mod signer;
pub mod types;
pub mod util;

pub use self::event::{Event, EventId, Kind, Tag, Tags, UnsignedEvent};
pub use self::filter::{Filter, SingleLetterTag};
pub use self::key::{Keys, PublicKey, SecretKey};
pub use self::message::{RelayMessage, SubscriptionId};
pub use self::signer::{NostrSigner, SignerBackend, SignerError};
pub use self::types::{RelayUrl, Timestamp};
pub use self::util::JsonUtil;
