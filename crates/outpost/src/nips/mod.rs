// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! NIPs
//!
//! See all: <https://github.com/nostr-protocol/nips>

pub mod nip04;
pub mod nip46;
pub mod nip65;
