// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Types

pub mod time;
pub mod url;

pub use self::time::Timestamp;
pub use self::url::RelayUrl;
