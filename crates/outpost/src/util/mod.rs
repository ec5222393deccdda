// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Util

use core::fmt::Debug;
use core::future::Future;
use core::pin::Pin;

use once_cell::sync::Lazy;
use secp256k1::rand::rngs::OsRng;
use secp256k1::{ecdh, All, Parity, PublicKey as NormalizedPublicKey, Secp256k1, SecretKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::key::PublicKey;

/// Boxed future
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Secp256k1 global context
pub static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(|| {
    let mut ctx = Secp256k1::new();
    ctx.randomize(&mut OsRng);
    ctx
});

/// Generate the ECDH shared key used by NIP-04.
///
/// The shared key is the x coordinate of the shared secret point.
pub fn generate_shared_key(secret_key: &SecretKey, public_key: &PublicKey) -> [u8; 32] {
    let pk: NormalizedPublicKey =
        NormalizedPublicKey::from_x_only_public_key(*public_key.as_xonly(), Parity::Even);
    let ssp: [u8; 64] = ecdh::shared_secret_point(&pk, secret_key);
    let mut shared_key: [u8; 32] = [0u8; 32];
    shared_key.copy_from_slice(&ssp[..32]);
    shared_key
}

/// JSON util
pub trait JsonUtil: Sized + Serialize + DeserializeOwned
where
    <Self as JsonUtil>::Err: From<serde_json::Error>,
{
    /// Error
    type Err: Debug;

    /// Deserialize JSON
    #[inline]
    fn from_json<T>(json: T) -> Result<Self, Self::Err>
    where
        T: AsRef<[u8]>,
    {
        Ok(serde_json::from_slice(json.as_ref())?)
    }

    /// Serialize as JSON string
    ///
    /// This method could panic! Use `try_as_json` for error propagation.
    #[inline]
    fn as_json(&self) -> String {
        self.try_as_json().unwrap()
    }

    /// Serialize as JSON string
    #[inline]
    fn try_as_json(&self) -> Result<String, Self::Err> {
        Ok(serde_json::to_string(self)?)
    }
}
