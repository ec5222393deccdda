// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Event

use core::fmt;

use secp256k1::schnorr::Signature;
use secp256k1::Message;
use serde::{Deserialize, Serialize};

pub mod id;
pub mod kind;
pub mod tag;
pub mod unsigned;

pub use self::id::EventId;
pub use self::kind::Kind;
pub use self::tag::{Tag, Tags, TagsIndexes};
pub use self::unsigned::UnsignedEvent;
use crate::key::{self, PublicKey};
use crate::types::Timestamp;
use crate::util::{JsonUtil, SECP256K1};

/// [`Event`] error
#[derive(Debug)]
pub enum Error {
    /// Invalid signature
    InvalidSignature,
    /// Invalid event id
    InvalidId,
    /// Key error
    Key(key::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "Invalid signature"),
            Self::InvalidId => write!(f, "Invalid event id"),
            Self::Key(e) => write!(f, "Key: {e}"),
            Self::Json(e) => write!(f, "Json: {e}"),
        }
    }
}

impl From<key::Error> for Error {
    fn from(e: key::Error) -> Self {
        Self::Key(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Signed, immutable event
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Id
    pub id: EventId,
    /// Author
    pub pubkey: PublicKey,
    /// Timestamp (seconds)
    pub created_at: Timestamp,
    /// Kind
    pub kind: Kind,
    /// Tags
    pub tags: Tags,
    /// Content
    pub content: String,
    /// Signature
    pub sig: Signature,
}

impl Event {
    /// Verify both id and signature
    ///
    /// Tampering with any field invalidates the id and the signature
    /// independently, so both checks are required.
    pub fn verify(&self) -> Result<(), Error> {
        self.verify_id()?;
        self.verify_signature()
    }

    /// Verify that the id equals the hash of the canonical serialization
    pub fn verify_id(&self) -> Result<(), Error> {
        let id: EventId = EventId::new(
            &self.pubkey,
            &self.created_at,
            &self.kind,
            &self.tags,
            &self.content,
        );
        if id == self.id {
            Ok(())
        } else {
            Err(Error::InvalidId)
        }
    }

    /// Verify only the signature against the author public key
    pub fn verify_signature(&self) -> Result<(), Error> {
        let message: Message = Message::from_digest(self.id.to_bytes());
        SECP256K1
            .verify_schnorr(&self.sig, &message, self.pubkey.as_xonly())
            .map_err(|_| Error::InvalidSignature)
    }

    /// Get the key under which copies of the same logical event collapse.
    ///
    /// Regular events are unique per id; replaceable events collapse per
    /// `(kind, author)`; parameterized replaceable events collapse per
    /// `(kind, author, d-tag)`, with a missing `d` tag counting as the
    /// empty string.
    pub fn deduplication_key(&self) -> String {
        if self.kind.is_parameterized_replaceable() {
            let identifier: &str = self.identifier().unwrap_or("");
            format!("{}:{}:{}", self.kind, self.pubkey, identifier)
        } else if self.kind.is_replaceable() {
            format!("{}:{}", self.kind, self.pubkey)
        } else {
            self.id.to_hex()
        }
    }

    /// Extract the identifier (`d` tag), if it exists
    #[inline]
    pub fn identifier(&self) -> Option<&str> {
        self.tags.identifier()
    }

    /// Check if the event kind is regular
    #[inline]
    pub fn is_regular(&self) -> bool {
        self.kind.is_regular()
    }

    /// Check if the event kind is replaceable
    #[inline]
    pub fn is_replaceable(&self) -> bool {
        self.kind.is_replaceable()
    }

    /// Check if the event kind is ephemeral
    #[inline]
    pub fn is_ephemeral(&self) -> bool {
        self.kind.is_ephemeral()
    }

    /// Check if the event kind is parameterized replaceable
    #[inline]
    pub fn is_parameterized_replaceable(&self) -> bool {
        self.kind.is_parameterized_replaceable()
    }
}

impl JsonUtil for Event {
    type Err = Error;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keys;

    fn signed_event(kind: Kind, tags: Tags, content: &str) -> (Keys, Event) {
        let keys = Keys::generate();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(1_700_000_000),
            kind,
            tags,
            content,
        )
        .sign(&keys)
        .unwrap();
        (keys, event)
    }

    #[test]
    fn test_verify_detects_tampering() {
        let (_, event) = signed_event(Kind::TEXT_NOTE, Tags::default(), "original");

        let mut tampered = event.clone();
        tampered.content = String::from("tampered");

        // Both checks fail independently
        assert!(tampered.verify_id().is_err());
        assert!(tampered.verify().is_err());

        // Tampering with the timestamp too
        let mut tampered = event;
        tampered.created_at = Timestamp::from(1_700_000_001);
        assert!(tampered.verify_id().is_err());
    }

    #[test]
    fn test_deduplication_key_regular() {
        let (_, event) = signed_event(Kind::TEXT_NOTE, Tags::default(), "note");
        assert_eq!(event.deduplication_key(), event.id.to_hex());
    }

    #[test]
    fn test_deduplication_key_replaceable() {
        let (keys, event) = signed_event(Kind::METADATA, Tags::default(), "{}");
        assert_eq!(
            event.deduplication_key(),
            format!("0:{}", keys.public_key())
        );
    }

    #[test]
    fn test_deduplication_key_parameterized() {
        let tags = Tags::new(vec![Tag::identifier("x")]);
        let (keys, event) = signed_event(Kind::new(30001), tags, "");
        assert_eq!(
            event.deduplication_key(),
            format!("30001:{}:x", keys.public_key())
        );

        // Missing `d` tag counts as empty string
        let (keys, event) = signed_event(Kind::new(30001), Tags::default(), "");
        assert_eq!(
            event.deduplication_key(),
            format!("30001:{}:", keys.public_key())
        );
    }

    #[test]
    fn test_json_round_trip() {
        let (_, event) = signed_event(
            Kind::TEXT_NOTE,
            Tags::new(vec![Tag::parse(["t", "nostr"]).unwrap()]),
            "hello",
        );
        let json: String = event.as_json();
        let back: Event = Event::from_json(&json).unwrap();
        assert_eq!(back, event);
        back.verify().unwrap();
    }
}
