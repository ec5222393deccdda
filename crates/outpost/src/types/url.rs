// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay url

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::{ParseError, Url};

/// Relay url error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// Url parse error
    Url(ParseError),
    /// Unsupported scheme
    UnsupportedScheme(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(e) => write!(f, "Url: {e}"),
            Self::UnsupportedScheme(scheme) => write!(f, "Unsupported scheme: {scheme}"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Url(e)
    }
}

/// Normalized relay url
///
/// Normalization: a missing scheme defaults to `wss://`, the host is
/// lowercased and the trailing slash is stripped. Comparison and hashing
/// happen on the normalized form, so `wss://relay.damus.io` and
/// `RELAY.DAMUS.IO/` are the same relay.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelayUrl(Url);

impl RelayUrl {
    /// Parse and normalize a relay url
    pub fn parse(url: &str) -> Result<Self, Error> {
        let mut url: Url = if url.contains("://") {
            Url::parse(url)?
        } else {
            Url::parse(&format!("wss://{url}"))?
        };

        match url.scheme() {
            "ws" | "wss" => {}
            scheme => return Err(Error::UnsupportedScheme(scheme.to_string())),
        }

        // Strip the trailing slash of non-root paths. The root path is
        // always stored as "/" by the parser and stripped on display.
        let path: &str = url.path();
        if path != "/" && path.ends_with('/') {
            let trimmed: String = path.trim_end_matches('/').to_string();
            url.set_path(&trimmed);
        }

        Ok(Self(url))
    }

    /// Get the normalized url as string, without the trailing slash
    pub fn as_str_without_trailing_slash(&self) -> &str {
        let s: &str = self.0.as_str();
        s.strip_suffix('/').unwrap_or(s)
    }

    /// Check if the relay is reachable only over a plaintext connection
    #[inline]
    pub fn is_plaintext(&self) -> bool {
        self.0.scheme() == "ws"
    }
}

impl FromStr for RelayUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Self::parse(url)
    }
}

impl TryFrom<&str> for RelayUrl {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        Self::parse(url)
    }
}

impl fmt::Display for RelayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_without_trailing_slash())
    }
}

impl Serialize for RelayUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str_without_trailing_slash())
    }
}

impl<'de> Deserialize<'de> for RelayUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let url: String = String::deserialize(deserializer)?;
        Self::parse(&url).map_err(serde::de::Error::custom)
    }
}
