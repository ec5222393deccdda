// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Prelude

#![allow(unknown_lints)]
#![allow(ambiguous_glob_reexports)]
#![doc(hidden)]

pub use outpost::prelude::*;
pub use outpost_pool::prelude::*;

pub use crate::error::*;
pub use crate::metrics::*;
pub use crate::options::*;
pub use crate::outbox::*;
pub use crate::router::*;
pub use crate::store::*;
pub use crate::subscriptions::*;
pub use crate::*;
