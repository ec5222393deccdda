// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Unsigned Event

use secp256k1::schnorr::Signature;
use secp256k1::Message;
use serde::{Deserialize, Serialize};

use super::{Error, Event, EventId, Kind, Tags};
use crate::key::{Keys, PublicKey};
use crate::types::Timestamp;
use crate::util::JsonUtil;

/// Event draft: all fields of an [`Event`] except the signature.
///
/// The id is computed at construction, so a draft is already bound to its
/// content: mutating any field requires building a new draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnsignedEvent {
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
}

impl UnsignedEvent {
    /// Construct a new draft, computing the canonical id
    pub fn new<S>(
        pubkey: PublicKey,
        created_at: Timestamp,
        kind: Kind,
        tags: Tags,
        content: S,
    ) -> Self
    where
        S: Into<String>,
    {
        let content: String = content.into();
        let id: EventId = EventId::new(&pubkey, &created_at, &kind, &tags, &content);
        Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
        }
    }

    /// Verify that the id matches the other fields
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

    /// Sign with [`Keys`]
    ///
    /// Fails with a key error if the keys are read-only.
    pub fn sign(self, keys: &Keys) -> Result<Event, Error> {
        let message: Message = Message::from_digest(self.id.to_bytes());
        let sig: Signature = keys.sign_schnorr(&message)?;
        self.add_signature(sig)
    }

    /// Add a signature produced elsewhere (e.g. by a remote signer)
    ///
    /// Verifies both the id and the signature before composing the event.
    pub fn add_signature(self, sig: Signature) -> Result<Event, Error> {
        let event = Event {
            id: self.id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        };
        event.verify()?;
        Ok(event)
    }
}

impl JsonUtil for UnsignedEvent {
    type Err = serde_json::Error;
}
