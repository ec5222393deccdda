// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Filters

use core::fmt;
use core::str::FromStr;
use std::collections::{BTreeMap, BTreeSet};

use bitcoin_hashes::sha256::Hash as Sha256Hash;
use bitcoin_hashes::Hash;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventId, Kind, TagsIndexes};
use crate::key::PublicKey;
use crate::types::Timestamp;
use crate::util::JsonUtil;

type GenericTags = BTreeMap<SingleLetterTag, BTreeSet<String>>;

pub(crate) const P_TAG: SingleLetterTag = SingleLetterTag('p');
const E_TAG: SingleLetterTag = SingleLetterTag('e');
const D_TAG: SingleLetterTag = SingleLetterTag('d');

/// Single-letter tag error
#[derive(Debug, PartialEq, Eq)]
pub enum SingleLetterTagError {
    /// Invalid char
    InvalidChar,
}

impl std::error::Error for SingleLetterTagError {}

impl fmt::Display for SingleLetterTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChar => write!(f, "invalid char"),
        }
    }
}

/// Single-letter tag name (a-zA-Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SingleLetterTag(char);

impl SingleLetterTag {
    /// Parse from [`char`]
    pub fn from_char(c: char) -> Result<Self, SingleLetterTagError> {
        if c.is_ascii_alphabetic() {
            Ok(Self(c))
        } else {
            Err(SingleLetterTagError::InvalidChar)
        }
    }

    /// Get as [`char`]
    #[inline]
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for SingleLetterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SingleLetterTag {
    type Err = SingleLetterTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => Err(SingleLetterTagError::InvalidChar),
        }
    }
}

impl Serialize for SingleLetterTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_char(self.0)
    }
}

impl<'de> Deserialize<'de> for SingleLetterTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let c: char = char::deserialize(deserializer)?;
        Self::from_char(c).map_err(serde::de::Error::custom)
    }
}

/// Subscription filter
///
/// Absent fields are omitted from the JSON entirely; tag constraints are
/// serialized with a `#` prefix plus the tag letter (e.g. `#e`, `#p`).
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Filter {
    /// List of [`EventId`]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub ids: Option<BTreeSet<EventId>>,
    /// List of [`PublicKey`]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub authors: Option<BTreeSet<PublicKey>>,
    /// List of kind numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub kinds: Option<BTreeSet<Kind>>,
    /// Free-text query. Relay-side hint: never affects client-side matching.
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/50.md>
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub search: Option<String>,
    /// Events must be newer than this to pass
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub since: Option<Timestamp>,
    /// Events must be older than this to pass
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub until: Option<Timestamp>,
    /// Maximum number of events the relay should return for the initial
    /// query. Relay-side hint: never affects client-side matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub limit: Option<usize>,
    /// Generic single-letter tag queries
    #[serde(
        flatten,
        serialize_with = "serialize_generic_tags",
        deserialize_with = "deserialize_generic_tags"
    )]
    #[serde(default)]
    pub generic_tags: GenericTags,
}

impl Filter {
    /// Create new empty [`Filter`]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add [`EventId`]
    #[inline]
    pub fn id(self, id: EventId) -> Self {
        self.ids([id])
    }

    /// Add event ids
    pub fn ids<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = EventId>,
    {
        self.ids.get_or_insert_with(BTreeSet::new).extend(ids);
        self
    }

    /// Add author
    #[inline]
    pub fn author(self, author: PublicKey) -> Self {
        self.authors([author])
    }

    /// Add authors
    pub fn authors<I>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.authors.get_or_insert_with(BTreeSet::new).extend(authors);
        self
    }

    /// Add kind
    #[inline]
    pub fn kind(self, kind: Kind) -> Self {
        self.kinds([kind])
    }

    /// Add kinds
    pub fn kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = Kind>,
    {
        self.kinds.get_or_insert_with(BTreeSet::new).extend(kinds);
        self
    }

    /// Add an `#e` tag constraint
    #[inline]
    pub fn event(self, id: EventId) -> Self {
        self.custom_tag(E_TAG, id.to_hex())
    }

    /// Add a `#p` tag constraint
    #[inline]
    pub fn pubkey(self, pubkey: PublicKey) -> Self {
        self.custom_tag(P_TAG, pubkey.to_hex())
    }

    /// Add `#p` tag constraints
    #[inline]
    pub fn pubkeys<I>(self, pubkeys: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.custom_tags(P_TAG, pubkeys.into_iter().map(|p| p.to_hex()))
    }

    /// Add a `#d` tag constraint
    #[inline]
    pub fn identifier<S>(self, identifier: S) -> Self
    where
        S: Into<String>,
    {
        self.custom_tag(D_TAG, identifier)
    }

    /// Add a custom tag constraint
    #[inline]
    pub fn custom_tag<S>(self, tag: SingleLetterTag, value: S) -> Self
    where
        S: Into<String>,
    {
        self.custom_tags(tag, [value])
    }

    /// Add custom tag constraints
    pub fn custom_tags<I, S>(mut self, tag: SingleLetterTag, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_tags
            .entry(tag)
            .or_default()
            .extend(values.into_iter().map(|v| v.into()));
        self
    }

    /// Add search field (relay-side hint)
    #[inline]
    pub fn search<S>(mut self, value: S) -> Self
    where
        S: Into<String>,
    {
        self.search = Some(value.into());
        self
    }

    /// Add since unix timestamp
    #[inline]
    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    /// Add until unix timestamp
    #[inline]
    pub fn until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    /// Add limit (relay-side hint)
    #[inline]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Strip the temporal constraints (`since`, `until`, `limit`)
    ///
    /// Two queries differing only in the time window describe the same
    /// logical subscription; this is the form used for [`Filter::fingerprint`].
    pub fn without_temporal_constraints(mut self) -> Self {
        self.since = None;
        self.until = None;
        self.limit = None;
        self
    }

    /// Check if [`Filter`] is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self == &Filter::default()
    }

    /// Extract **all** public keys (both from `authors` and `#p`)
    pub fn extract_public_keys(&self) -> BTreeSet<PublicKey> {
        let mut public_keys: BTreeSet<PublicKey> = BTreeSet::new();

        if let Some(authors) = &self.authors {
            public_keys.extend(authors.iter().copied());
        }

        if let Some(p_tag) = self.generic_tags.get(&P_TAG) {
            public_keys.extend(p_tag.iter().filter_map(|p| PublicKey::from_hex(p).ok()));
        }

        public_keys
    }

    /// Deterministic, order-independent digest of the non-temporal fields
    /// (ids, authors, kinds, tag constraints).
    ///
    /// `since`, `until`, `limit` and `search` are deliberately excluded, so
    /// two filters differing only in those fields fingerprint identically.
    /// Sets are BTree-ordered, so the digest does not depend on insertion
    /// order.
    pub fn fingerprint(&self) -> String {
        let mut stripped: Filter = self.clone().without_temporal_constraints();
        stripped.search = None;

        let json: String = stripped.as_json();
        Sha256Hash::hash(json.as_bytes()).to_string()
    }

    #[inline]
    fn ids_match(&self, event: &Event) -> bool {
        self.ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&event.id))
    }

    #[inline]
    fn authors_match(&self, event: &Event) -> bool {
        self.authors
            .as_ref()
            .map_or(true, |authors| authors.contains(&event.pubkey))
    }

    #[inline]
    fn kind_match(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&event.kind))
    }

    fn tag_match(&self, event: &Event) -> bool {
        if self.generic_tags.is_empty() {
            return true;
        }

        if event.tags.is_empty() {
            return false;
        }

        let indexes: &TagsIndexes = event.tags.indexes();

        self.generic_tags.iter().all(|(tag_name, set)| {
            if let Some(val_set) = indexes.get(tag_name) {
                set.iter().any(|t| val_set.contains(t))
            } else {
                false
            }
        })
    }

    /// Determine if the filter matches the given [`Event`].
    ///
    /// Pure conjunction over the populated constraints. `limit` and
    /// `search` are relay-side hints and never considered here.
    #[inline]
    pub fn match_event(&self, event: &Event) -> bool {
        self.ids_match(event)
            && self.authors_match(event)
            && self.kind_match(event)
            && self.since.map_or(true, |t| event.created_at >= t)
            && self.until.map_or(true, |t| event.created_at <= t)
            && self.tag_match(event)
    }
}

impl JsonUtil for Filter {
    type Err = serde_json::Error;
}

fn serialize_generic_tags<S>(generic_tags: &GenericTags, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(generic_tags.len()))?;
    for (tag, values) in generic_tags.iter() {
        map.serialize_entry(&format!("#{tag}"), values)?;
    }
    map.end()
}

fn deserialize_generic_tags<'de, D>(deserializer: D) -> Result<GenericTags, D::Error>
where
    D: Deserializer<'de>,
{
    struct GenericTagsVisitor;

    impl<'de> Visitor<'de> for GenericTagsVisitor {
        type Value = GenericTags;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("map in which the keys are \"#X\" for some character X")
        }

        fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut generic_tags = BTreeMap::new();
            while let Some(key) = map.next_key::<String>()? {
                let mut chars = key.chars();
                if let (Some('#'), Some(ch), None) = (chars.next(), chars.next(), chars.next()) {
                    let tag: SingleLetterTag =
                        SingleLetterTag::from_char(ch).map_err(serde::de::Error::custom)?;
                    let values: BTreeSet<String> = map.next_value()?;
                    generic_tags.insert(tag, values);
                } else {
                    map.next_value::<serde::de::IgnoredAny>()?;
                }
            }
            Ok(generic_tags)
        }
    }

    deserializer.deserialize_map(GenericTagsVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Tag, Tags, UnsignedEvent};
    use crate::Keys;

    fn dummy_event(keys: &Keys, kind: Kind, tags: Tags, created_at: u64) -> Event {
        UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from(created_at),
            kind,
            tags,
            "content",
        )
        .sign(keys)
        .unwrap()
    }

    #[test]
    fn test_match_is_pure_conjunction() {
        let keys = Keys::generate();
        let other = Keys::generate();
        let event = dummy_event(&keys, Kind::TEXT_NOTE, Tags::default(), 2000);

        let filter = Filter::new()
            .kind(Kind::TEXT_NOTE)
            .author(keys.public_key())
            .since(Timestamp::from(1000))
            .until(Timestamp::from(3000));
        assert!(filter.match_event(&event));

        // Flipping any one dimension flips the result, independently
        assert!(!filter.clone().kinds([Kind::METADATA]).match_event(&event));
        assert!(!Filter::new()
            .kind(Kind::TEXT_NOTE)
            .author(other.public_key())
            .since(Timestamp::from(1000))
            .until(Timestamp::from(3000))
            .match_event(&event));
        assert!(!Filter::new()
            .kind(Kind::TEXT_NOTE)
            .author(keys.public_key())
            .since(Timestamp::from(2001))
            .match_event(&event));
        assert!(!Filter::new()
            .kind(Kind::TEXT_NOTE)
            .author(keys.public_key())
            .until(Timestamp::from(1999))
            .match_event(&event));
    }

    #[test]
    fn test_tag_match() {
        let keys = Keys::generate();
        let tags = Tags::new(vec![Tag::parse(["t", "nostr"]).unwrap()]);
        let event = dummy_event(&keys, Kind::TEXT_NOTE, tags, 2000);

        let t = SingleLetterTag::from_char('t').unwrap();
        assert!(Filter::new().custom_tag(t, "nostr").match_event(&event));
        assert!(Filter::new()
            .custom_tags(t, ["bitcoin", "nostr"])
            .match_event(&event));
        assert!(!Filter::new().custom_tag(t, "bitcoin").match_event(&event));

        // A declared tag constraint never matches an event without tags
        let bare = dummy_event(&keys, Kind::TEXT_NOTE, Tags::default(), 2000);
        assert!(!Filter::new().custom_tag(t, "nostr").match_event(&bare));
    }

    #[test]
    fn test_limit_and_search_ignored_by_matching() {
        let keys = Keys::generate();
        let event = dummy_event(&keys, Kind::TEXT_NOTE, Tags::default(), 2000);

        let filter = Filter::new().limit(0).search("does not appear");
        assert!(filter.match_event(&event));
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let a = Filter::new().kinds([Kind::new(1), Kind::new(2)]);
        let b = Filter::new().kinds([Kind::new(2), Kind::new(1)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_excludes_temporal_fields() {
        let base = Filter::new().kind(Kind::TEXT_NOTE);
        let windowed = base
            .clone()
            .since(Timestamp::from(1000))
            .until(Timestamp::from(3000))
            .limit(10);
        assert_eq!(base.fingerprint(), windowed.fingerprint());

        let different = Filter::new().kind(Kind::METADATA);
        assert_ne!(base.fingerprint(), different.fingerprint());
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let filter = Filter::new().kind(Kind::TEXT_NOTE);
        assert_eq!(filter.as_json(), r#"{"kinds":[1]}"#);
    }

    #[test]
    fn test_tag_serialization_prefix() {
        let keys = Keys::generate();
        let filter = Filter::new().pubkey(keys.public_key());
        let json = format!(r##"{{"#p":["{}"]}}"##, keys.public_key());
        assert_eq!(filter.as_json(), json);
        assert_eq!(Filter::from_json(&json).unwrap(), filter);
    }

    #[test]
    fn test_extract_public_keys() {
        let a = Keys::generate().public_key();
        let b = Keys::generate().public_key();

        let filter = Filter::new().author(a).pubkey(b);
        let extracted = filter.extract_public_keys();
        assert!(extracted.contains(&a));
        assert!(extracted.contains(&b));
        assert_eq!(extracted.len(), 2);
    }
}
