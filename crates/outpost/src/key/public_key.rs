// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Public key

use core::fmt;
use core::str::FromStr;

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Error;

/// Public key size (32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Public Key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(XOnlyPublicKey);

impl PublicKey {
    /// Parse from `hex` string
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        Ok(Self(XOnlyPublicKey::from_str(hex)?))
    }

    /// Parse from bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self(XOnlyPublicKey::from_slice(slice)?))
    }

    /// Get public key as `hex` string
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }

    /// Get public key as bytes
    #[inline]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.serialize()
    }

    /// Get the underlying x-only key
    #[inline]
    pub fn as_xonly(&self) -> &XOnlyPublicKey {
        &self.0
    }
}

impl From<XOnlyPublicKey> for PublicKey {
    fn from(pk: XOnlyPublicKey) -> Self {
        Self(pk)
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Self::from_hex(hex)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex: String = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
