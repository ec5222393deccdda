// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Kind

use core::fmt;
use core::num::ParseIntError;
use core::str::FromStr;

use serde::de::{Deserializer, Error as DeserializerError, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Event kind
///
/// Whether an event is regular, replaceable, ephemeral or parameterized
/// replaceable is derived from the numeric value, never stored.
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kind(u16);

impl Kind {
    /// Metadata (NIP-01)
    pub const METADATA: Self = Self(0);
    /// Short text note (NIP-01)
    pub const TEXT_NOTE: Self = Self(1);
    /// Contact list (NIP-02)
    pub const CONTACT_LIST: Self = Self(3);
    /// Relay list metadata (NIP-65)
    pub const RELAY_LIST: Self = Self(10002);
    /// Nostr Connect (NIP-46)
    pub const NOSTR_CONNECT: Self = Self(24133);

    /// Construct from 16-bit number
    #[inline]
    pub const fn new(kind: u16) -> Self {
        Self(kind)
    }

    /// Get as 16-bit number
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Check if the kind is regular: a relay stores every event of this kind.
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/01.md>
    #[inline]
    pub const fn is_regular(&self) -> bool {
        !self.is_replaceable() && !self.is_ephemeral() && !self.is_parameterized_replaceable()
    }

    /// Check if the kind is replaceable: only the newest event per
    /// `(kind, author)` survives.
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/01.md>
    #[inline]
    pub const fn is_replaceable(&self) -> bool {
        self.0 == 0 || self.0 == 3 || (self.0 >= 10_000 && self.0 < 20_000)
    }

    /// Check if the kind is ephemeral: never persisted.
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/01.md>
    #[inline]
    pub const fn is_ephemeral(&self) -> bool {
        self.0 >= 20_000 && self.0 < 30_000
    }

    /// Check if the kind is parameterized replaceable: only the newest event
    /// per `(kind, author, d-tag)` survives.
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/01.md>
    #[inline]
    pub const fn is_parameterized_replaceable(&self) -> bool {
        self.0 >= 30_000 && self.0 < 40_000
    }
}

impl From<u16> for Kind {
    fn from(kind: u16) -> Self {
        Self(kind)
    }
}

impl From<Kind> for u16 {
    fn from(kind: Kind) -> Self {
        kind.0
    }
}

impl FromStr for Kind {
    type Err = ParseIntError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        Ok(Self(kind.parse()?))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Kind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u64(KindVisitor)
    }
}

struct KindVisitor;

impl Visitor<'_> for KindVisitor {
    type Value = Kind;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an unsigned number up to 65535")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Kind, E>
    where
        E: DeserializerError,
    {
        let kind: u16 = u16::try_from(v).map_err(E::custom)?;
        Ok(Kind::new(kind))
    }
}
