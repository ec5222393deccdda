// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Prelude

#![allow(unknown_lints)]
#![allow(ambiguous_glob_reexports)]
#![doc(hidden)]

pub use crate::event::id::*;
pub use crate::event::kind::*;
pub use crate::event::tag::*;
pub use crate::event::unsigned::*;
pub use crate::event::{self, *};
pub use crate::filter::{self, *};
pub use crate::key::{self, *};
pub use crate::message::{self, *};
pub use crate::nips::nip04;
pub use crate::nips::nip46::{self, NostrConnectURI};
pub use crate::nips::nip65::{self, RelayList, RelayMetadata};
pub use crate::signer::{self, *};
pub use crate::types::time::*;
pub use crate::types::url::*;
pub use crate::types::{self, *};
pub use crate::util::{BoxedFuture, JsonUtil};
