// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Event Id

use core::fmt;
use core::str::FromStr;

use bitcoin_hashes::sha256::Hash as Sha256Hash;
use bitcoin_hashes::Hash;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Kind, Tags};
use crate::key::PublicKey;
use crate::types::Timestamp;

/// [`EventId`] error
#[derive(Debug)]
pub enum Error {
    /// Hex decoding error
    Hex(bitcoin_hashes::hex::HexToArrayError),
    /// Invalid length
    Slice(bitcoin_hashes::FromSliceError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(e) => write!(f, "Hex: {e}"),
            Self::Slice(e) => write!(f, "Slice: {e}"),
        }
    }
}

/// Event Id
///
/// 32-byte lowercase hex-encoded sha256 of the serialized event data:
/// `[0, pubkey, created_at, kind, tags, content]` as compact JSON.
///
/// The serialization is bit-exact by contract: field order, numeric
/// formatting and string escaping must match every other implementation
/// of the protocol.
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Sha256Hash);

impl EventId {
    /// Calculate the id of an event with these fields
    pub fn new(
        pubkey: &PublicKey,
        created_at: &Timestamp,
        kind: &Kind,
        tags: &Tags,
        content: &str,
    ) -> Self {
        let json: Value = json!([0, pubkey, created_at, kind, tags, content]);
        let event_str: String = json.to_string();
        Self(Sha256Hash::hash(event_str.as_bytes()))
    }

    /// Parse from `hex` string
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        Ok(Self(Sha256Hash::from_str(hex).map_err(Error::Hex)?))
    }

    /// Parse from bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self(Sha256Hash::from_slice(slice).map_err(Error::Slice)?))
    }

    /// All zeros
    pub fn all_zeros() -> Self {
        Self(Sha256Hash::all_zeros())
    }

    /// Get as bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_byte_array()
    }

    /// Get owned bytes
    #[inline]
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_byte_array()
    }

    /// Get as `hex` string
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }
}

impl FromStr for EventId {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Self::from_hex(hex)
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
