// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Tag

use core::fmt;
use core::hash::{Hash, Hasher};
use core::slice::Iter;
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::EventId;
use crate::filter::SingleLetterTag;
use crate::key::PublicKey;
use crate::nips::nip65::RelayMetadata;
use crate::types::RelayUrl;

/// Single-letter tag indexes: tag letter -> set of second elements
pub type TagsIndexes = BTreeMap<SingleLetterTag, BTreeSet<String>>;

/// [`Tag`] error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Empty tag
    EmptyTag,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTag => write!(f, "Empty tag"),
        }
    }
}

/// Tag: an ordered, non-empty sequence of strings.
///
/// The first element is the tag name, the rest are its values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Parse a tag from a list of values
    pub fn parse<I, S>(tag: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buf: Vec<String> = tag.into_iter().map(|v| v.into()).collect();

        if buf.is_empty() {
            return Err(Error::EmptyTag);
        }

        Ok(Self(buf))
    }

    /// Compose a `d` tag
    ///
    /// JSON: `["d", "<identifier>"]`
    pub fn identifier<S>(identifier: S) -> Self
    where
        S: Into<String>,
    {
        Self(vec![String::from("d"), identifier.into()])
    }

    /// Compose a `p` tag
    ///
    /// JSON: `["p", "<public-key>"]`
    pub fn public_key(public_key: PublicKey) -> Self {
        Self(vec![String::from("p"), public_key.to_hex()])
    }

    /// Compose an `e` tag
    ///
    /// JSON: `["e", "<event-id>"]`
    pub fn event(event_id: EventId) -> Self {
        Self(vec![String::from("e"), event_id.to_hex()])
    }

    /// Compose an `r` tag with an optional read/write marker
    ///
    /// JSON: `["r", "<relay-url>"]`, `["r", "<relay-url>", "read"]` or
    /// `["r", "<relay-url>", "write"]`
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/65.md>
    pub fn relay_metadata(relay_url: &RelayUrl, metadata: Option<RelayMetadata>) -> Self {
        let mut buf: Vec<String> = vec![String::from("r"), relay_url.to_string()];
        if let Some(metadata) = metadata {
            buf.push(metadata.to_string());
        }
        Self(buf)
    }

    /// Get the tag name (first element)
    #[inline]
    pub fn kind(&self) -> &str {
        // SAFETY: `parse` rejects empty tags
        &self.0[0]
    }

    /// Get the tag content (second element), if any
    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.0.get(1).map(|s| s.as_str())
    }

    /// Get the single-letter name, if the tag name is a single ascii letter
    pub fn single_letter_tag(&self) -> Option<SingleLetterTag> {
        let mut chars = self.kind().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => SingleLetterTag::from_char(c).ok(),
            _ => None,
        }
    }

    /// Get tag values as slice
    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf: Vec<String> = Vec::deserialize(deserializer)?;
        Self::parse(buf).map_err(serde::de::Error::custom)
    }
}

/// Tags collection with lazily built single-letter indexes
#[derive(Debug, Clone, Default)]
pub struct Tags {
    list: Vec<Tag>,
    indexes: OnceCell<TagsIndexes>,
}

impl Tags {
    /// Construct a new tags collection
    #[inline]
    pub fn new(list: Vec<Tag>) -> Self {
        Self {
            list,
            indexes: OnceCell::new(),
        }
    }

    /// Check if there are no tags
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Number of tags
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Iterate tags
    #[inline]
    pub fn iter(&self) -> Iter<'_, Tag> {
        self.list.iter()
    }

    /// Extract the identifier (`d` tag), if it exists.
    ///
    /// A `d` tag without a value counts as an empty identifier.
    pub fn identifier(&self) -> Option<&str> {
        self.list
            .iter()
            .find(|tag| tag.kind() == "d")
            .map(|tag| tag.content().unwrap_or(""))
    }

    /// Get the single-letter indexes, building them on first use
    pub fn indexes(&self) -> &TagsIndexes {
        self.indexes.get_or_init(|| {
            let mut indexes: TagsIndexes = TagsIndexes::new();
            for tag in self.list.iter() {
                if let (Some(letter), Some(content)) = (tag.single_letter_tag(), tag.content()) {
                    indexes.entry(letter).or_default().insert(content.to_string());
                }
            }
            indexes
        })
    }

    /// Get tags as slice
    #[inline]
    pub fn as_slice(&self) -> &[Tag] {
        &self.list
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl Eq for Tags {}

impl Hash for Tags {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.list.hash(state);
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(list: Vec<Tag>) -> Self {
        Self::new(list)
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

impl Serialize for Tags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list: Vec<Tag> = Vec::deserialize(deserializer)?;
        Ok(Self::new(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tag_rejected() {
        assert_eq!(Tag::parse(Vec::<String>::new()).unwrap_err(), Error::EmptyTag);
    }

    #[test]
    fn test_identifier() {
        let tags = Tags::new(vec![
            Tag::parse(["t", "nostr"]).unwrap(),
            Tag::identifier("my-article"),
        ]);
        assert_eq!(tags.identifier(), Some("my-article"));

        // `d` tag without value counts as empty identifier
        let tags = Tags::new(vec![Tag::parse(["d"]).unwrap()]);
        assert_eq!(tags.identifier(), Some(""));

        let tags = Tags::default();
        assert_eq!(tags.identifier(), None);
    }

    #[test]
    fn test_indexes() {
        let tags = Tags::new(vec![
            Tag::parse(["t", "nostr"]).unwrap(),
            Tag::parse(["t", "rust"]).unwrap(),
            Tag::parse(["expiration", "1600000000"]).unwrap(),
        ]);

        let indexes = tags.indexes();
        let t = SingleLetterTag::from_char('t').unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(indexes.get(&t).unwrap().contains("nostr"));
        assert!(indexes.get(&t).unwrap().contains("rust"));
    }

    #[test]
    fn test_serde() {
        let json = r#"[["p","aa4fc8665f5696e33db7e1a572e3b0f5b3d615837b0f362dcb1c8068b098c7b4"],["r","wss://relay.damus.io","read"]]"#;
        let tags: Tags = serde_json::from_str(json).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(serde_json::to_string(&tags).unwrap(), json);
    }
}
