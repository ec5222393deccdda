// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! NIP65: Relay List Metadata
//!
//! <https://github.com/nostr-protocol/nips/blob/master/65.md>

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

use crate::event::{Event, Kind};
use crate::key::PublicKey;
use crate::types::{RelayUrl, Timestamp};

/// NIP65 error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Invalid relay metadata marker
    InvalidRelayMetadata(String),
    /// The event is not a relay list
    UnexpectedKind(Kind),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRelayMetadata(m) => write!(f, "Invalid relay metadata: {m}"),
            Self::UnexpectedKind(kind) => {
                write!(f, "Unexpected kind: expected {}, got {kind}", Kind::RELAY_LIST)
            }
        }
    }
}

/// Relay metadata marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelayMetadata {
    /// Read
    Read,
    /// Write
    Write,
}

impl RelayMetadata {
    /// Get as `&str`
    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for RelayMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayMetadata {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            s => Err(Error::InvalidRelayMetadata(s.to_string())),
        }
    }
}

/// Relay preferences declared by an author: the author's write relays are
/// their "outbox", the read relays their "inbox".
///
/// Parsed once per kind-10002 event. A relay url with no marker lands in
/// both sets; a marked url lands only in the marked set. Urls are
/// normalized through [`RelayUrl`] before being stored or compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayList {
    /// Author
    pub public_key: PublicKey,
    /// Timestamp of the relay list event
    pub created_at: Timestamp,
    /// Read relays (inbox)
    pub read: BTreeSet<RelayUrl>,
    /// Write relays (outbox)
    pub write: BTreeSet<RelayUrl>,
}

impl RelayList {
    /// Parse a relay list from a kind-10002 event.
    ///
    /// Tags that are not valid `r` tags and urls that can't be normalized
    /// are skipped, not treated as fatal.
    pub fn from_event(event: &Event) -> Result<Self, Error> {
        if event.kind != Kind::RELAY_LIST {
            return Err(Error::UnexpectedKind(event.kind));
        }

        let mut read: BTreeSet<RelayUrl> = BTreeSet::new();
        let mut write: BTreeSet<RelayUrl> = BTreeSet::new();

        for (url, metadata) in extract_relay_list(event) {
            match metadata {
                Some(RelayMetadata::Read) => {
                    read.insert(url);
                }
                Some(RelayMetadata::Write) => {
                    write.insert(url);
                }
                None => {
                    read.insert(url.clone());
                    write.insert(url);
                }
            }
        }

        Ok(Self {
            public_key: event.pubkey,
            created_at: event.created_at,
            read,
            write,
        })
    }

    /// Check if both sets are empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// Extract the relay info (url, optional read/write flag) from an event
pub fn extract_relay_list(
    event: &Event,
) -> impl Iterator<Item = (RelayUrl, Option<RelayMetadata>)> + '_ {
    event.tags.iter().filter_map(|tag| {
        if tag.kind() != "r" {
            return None;
        }

        let url: RelayUrl = RelayUrl::parse(tag.content()?).ok()?;

        match tag.as_slice().get(2) {
            Some(marker) => {
                let metadata: RelayMetadata = RelayMetadata::from_str(marker).ok()?;
                Some((url, Some(metadata)))
            }
            None => Some((url, None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Tag, Tags, UnsignedEvent};
    use crate::Keys;

    fn relay_list_event(keys: &Keys, relays: Vec<(&str, Option<RelayMetadata>)>) -> Event {
        let tags: Tags = relays
            .into_iter()
            .map(|(url, metadata)| {
                Tag::relay_metadata(&RelayUrl::parse(url).unwrap(), metadata)
            })
            .collect();
        UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::RELAY_LIST,
            tags,
            "",
        )
        .sign(keys)
        .unwrap()
    }

    #[test]
    fn test_from_event() {
        let keys = Keys::generate();
        let event = relay_list_event(
            &keys,
            vec![
                ("wss://relay.damus.io", None),
                ("wss://nos.lol", Some(RelayMetadata::Write)),
                ("wss://nostr.mom", Some(RelayMetadata::Read)),
            ],
        );

        let list = RelayList::from_event(&event).unwrap();
        assert_eq!(list.public_key, keys.public_key());

        let damus = RelayUrl::parse("wss://relay.damus.io").unwrap();
        let nos = RelayUrl::parse("wss://nos.lol").unwrap();
        let mom = RelayUrl::parse("wss://nostr.mom").unwrap();

        // Unmarked url lands in both sets, marked ones only in their own
        assert!(list.read.contains(&damus));
        assert!(list.write.contains(&damus));
        assert!(list.write.contains(&nos));
        assert!(!list.read.contains(&nos));
        assert!(list.read.contains(&mom));
        assert!(!list.write.contains(&mom));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let keys = Keys::generate();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::TEXT_NOTE,
            Tags::default(),
            "",
        )
        .sign(&keys)
        .unwrap();

        assert!(matches!(
            RelayList::from_event(&event).unwrap_err(),
            Error::UnexpectedKind(..)
        ));
    }

    #[test]
    fn test_urls_normalized() {
        let keys = Keys::generate();
        let tags: Tags = vec![Tag::parse(["r", "RELAY.DAMUS.IO/"]).unwrap()]
            .into_iter()
            .collect();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(1_700_000_000),
            Kind::RELAY_LIST,
            tags,
            "",
        )
        .sign(&keys)
        .unwrap();

        let list = RelayList::from_event(&event).unwrap();
        let expected = RelayUrl::parse("wss://relay.damus.io").unwrap();
        assert!(list.read.contains(&expected));
        assert!(list.write.contains(&expected));
    }
}
