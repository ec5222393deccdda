// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Keys
//!
//! Local keypair: the [`Keys`] struct holds a public key and, unless it was
//! constructed from a public key only, the secret key used for signing.

use core::fmt;
use core::str::FromStr;

use secp256k1::rand::rngs::OsRng;
use secp256k1::schnorr::Signature;
use secp256k1::{self, Keypair, Message, XOnlyPublicKey};
pub use secp256k1::SecretKey;

mod public_key;

pub use self::public_key::PublicKey;
use crate::util::SECP256K1;

/// [`Keys`] error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The keys are public-key only, signing is not authorized
    SecretKeyMissing,
    /// Secp256k1 error
    Secp256k1(secp256k1::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretKeyMissing => write!(f, "Secret key missing: can't sign with read-only keys"),
            Self::Secp256k1(e) => write!(f, "Secp256k1: {e}"),
        }
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Secp256k1(e)
    }
}

/// Keys
#[derive(Clone, PartialEq, Eq)]
pub struct Keys {
    public_key: PublicKey,
    key_pair: Option<Keypair>,
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl Keys {
    /// Initialize from secret key
    pub fn new(secret_key: SecretKey) -> Self {
        let key_pair: Keypair = Keypair::from_secret_key(&SECP256K1, &secret_key);
        let (public_key, _) = XOnlyPublicKey::from_keypair(&key_pair);

        Self {
            public_key: PublicKey::from(public_key),
            key_pair: Some(key_pair),
        }
    }

    /// Generate new random keys
    pub fn generate() -> Self {
        Self::new(SecretKey::new(&mut OsRng))
    }

    /// Parse secret key from `hex` string
    pub fn parse(secret_key: &str) -> Result<Self, Error> {
        Ok(Self::new(SecretKey::from_str(secret_key)?))
    }

    /// Initialize read-only keys (public key only)
    ///
    /// Any attempt to sign with these keys fails with [`Error::SecretKeyMissing`].
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self {
            public_key,
            key_pair: None,
        }
    }

    /// Get the public key
    #[inline]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Check if these keys can sign
    #[inline]
    pub fn can_sign(&self) -> bool {
        self.key_pair.is_some()
    }

    /// Get the secret key
    pub fn secret_key(&self) -> Result<SecretKey, Error> {
        match &self.key_pair {
            Some(key_pair) => Ok(key_pair.secret_key()),
            None => Err(Error::SecretKeyMissing),
        }
    }

    /// Sign a schnorr [`Message`]
    ///
    /// The signature is deterministic: the same message always produces the
    /// same signature (BIP-340 without auxiliary randomness).
    pub fn sign_schnorr(&self, message: &Message) -> Result<Signature, Error> {
        match &self.key_pair {
            Some(key_pair) => Ok(SECP256K1.sign_schnorr_no_aux_rand(message, key_pair)),
            None => Err(Error::SecretKeyMissing),
        }
    }
}
