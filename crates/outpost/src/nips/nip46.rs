// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! NIP46: Nostr Connect
//!
//! Remote signing negotiated over relays: requests and responses are
//! NIP-04 encrypted kind-24133 events between the client keys and the
//! party holding the real signing key.
//!
//! <https://github.com/nostr-protocol/nips/blob/master/46.md>

use core::fmt;
use core::str::FromStr;

use secp256k1::rand::rngs::OsRng;
use secp256k1::rand::RngCore;
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::event::{Event, UnsignedEvent};
use crate::key::PublicKey;
use crate::types::url as relay_url;
use crate::types::RelayUrl;
use crate::util::JsonUtil;
use crate::{event, key};

/// NIP46 error
#[derive(Debug)]
pub enum Error {
    /// Invalid URI
    InvalidUri,
    /// Unexpected URI scheme
    UnexpectedScheme(String),
    /// Key error
    Key(key::Error),
    /// Relay url error
    RelayUrl(relay_url::Error),
    /// Event error
    Event(event::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
    /// Unknown method
    UnknownMethod(String),
    /// Unexpected result payload
    UnexpectedResult,
    /// Response without result
    ResponseWithoutResult,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUri => write!(f, "Invalid uri"),
            Self::UnexpectedScheme(scheme) => write!(f, "Unexpected scheme: {scheme}"),
            Self::Key(e) => write!(f, "Key: {e}"),
            Self::RelayUrl(e) => write!(f, "Relay url: {e}"),
            Self::Event(e) => write!(f, "Event: {e}"),
            Self::Json(e) => write!(f, "Json: {e}"),
            Self::UnknownMethod(method) => write!(f, "Unknown method: {method}"),
            Self::UnexpectedResult => write!(f, "Unexpected result payload"),
            Self::ResponseWithoutResult => write!(f, "Response without result"),
        }
    }
}

impl From<key::Error> for Error {
    fn from(e: key::Error) -> Self {
        Self::Key(e)
    }
}

impl From<relay_url::Error> for Error {
    fn from(e: relay_url::Error) -> Self {
        Self::RelayUrl(e)
    }
}

impl From<event::Error> for Error {
    fn from(e: event::Error) -> Self {
        Self::Event(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

fn url_encode<T>(data: T) -> String
where
    T: AsRef<[u8]>,
{
    form_urlencoded::byte_serialize(data.as_ref()).collect()
}

/// Nostr Connect URI
///
/// Either a `bunker://` token shared by the remote signer, or a
/// `nostrconnect://` URI generated by the client and displayed (usually as
/// a scannable code) for the remote signer to pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NostrConnectURI {
    /// Token shared by the remote signer
    Bunker {
        /// The public key that produces the signatures
        signer_public_key: PublicKey,
        /// Relays to negotiate over
        relays: Vec<RelayUrl>,
        /// Shared secret, echoed back in `connect`
        secret: Option<String>,
    },
    /// URI generated by the client for signer-side discovery
    Client {
        /// The client (ephemeral) public key
        public_key: PublicKey,
        /// Relays to negotiate over
        relays: Vec<RelayUrl>,
        /// Shared secret, expected in the remote party's `connect`
        secret: Option<String>,
        /// Human readable application name
        app_name: Option<String>,
    },
}

impl NostrConnectURI {
    /// Parse from string
    pub fn parse(uri: &str) -> Result<Self, Error> {
        let (is_bunker, rest) = if let Some(rest) = uri.strip_prefix("bunker://") {
            (true, rest)
        } else if let Some(rest) = uri.strip_prefix("nostrconnect://") {
            (false, rest)
        } else {
            let scheme: &str = uri.split("://").next().unwrap_or(uri);
            return Err(Error::UnexpectedScheme(scheme.to_string()));
        };

        let (pubkey_hex, query) = match rest.split_once('?') {
            Some((pubkey_hex, query)) => (pubkey_hex, query),
            None => (rest, ""),
        };

        if pubkey_hex.is_empty() {
            return Err(Error::InvalidUri);
        }

        let public_key: PublicKey = PublicKey::from_hex(pubkey_hex)?;

        let mut relays: Vec<RelayUrl> = Vec::new();
        let mut secret: Option<String> = None;
        let mut app_name: Option<String> = None;

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "relay" => relays.push(RelayUrl::parse(&value)?),
                "secret" => secret = Some(value.into_owned()),
                "name" => app_name = Some(value.into_owned()),
                _ => {}
            }
        }

        if is_bunker {
            Ok(Self::Bunker {
                signer_public_key: public_key,
                relays,
                secret,
            })
        } else {
            Ok(Self::Client {
                public_key,
                relays,
                secret,
                app_name,
            })
        }
    }

    /// Check if the URI is a `bunker://` token
    #[inline]
    pub fn is_bunker(&self) -> bool {
        matches!(self, Self::Bunker { .. })
    }

    /// Get the remote signer public key, if already known
    pub fn signer_public_key(&self) -> Option<PublicKey> {
        match self {
            Self::Bunker {
                signer_public_key, ..
            } => Some(*signer_public_key),
            Self::Client { .. } => None,
        }
    }

    /// Get the relays to negotiate over
    pub fn relays(&self) -> &[RelayUrl] {
        match self {
            Self::Bunker { relays, .. } => relays,
            Self::Client { relays, .. } => relays,
        }
    }

    /// Get the shared secret
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Bunker { secret, .. } => secret.as_deref(),
            Self::Client { secret, .. } => secret.as_deref(),
        }
    }
}

impl FromStr for NostrConnectURI {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        Self::parse(uri)
    }
}

impl fmt::Display for NostrConnectURI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bunker {
                signer_public_key,
                relays,
                secret,
            } => {
                write!(f, "bunker://{signer_public_key}?")?;
                let mut first: bool = true;
                for relay in relays.iter() {
                    if !first {
                        write!(f, "&")?;
                    }
                    write!(f, "relay={}", url_encode(relay.to_string()))?;
                    first = false;
                }
                if let Some(secret) = secret {
                    if !first {
                        write!(f, "&")?;
                    }
                    write!(f, "secret={}", url_encode(secret))?;
                }
                Ok(())
            }
            Self::Client {
                public_key,
                relays,
                secret,
                app_name,
            } => {
                write!(f, "nostrconnect://{public_key}?")?;
                let mut first: bool = true;
                for relay in relays.iter() {
                    if !first {
                        write!(f, "&")?;
                    }
                    write!(f, "relay={}", url_encode(relay.to_string()))?;
                    first = false;
                }
                if let Some(secret) = secret {
                    if !first {
                        write!(f, "&")?;
                    }
                    write!(f, "secret={}", url_encode(secret))?;
                    first = false;
                }
                if let Some(app_name) = app_name {
                    if !first {
                        write!(f, "&")?;
                    }
                    write!(f, "name={}", url_encode(app_name))?;
                }
                Ok(())
            }
        }
    }
}

/// Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Connect
    Connect {
        /// The remote signer public key
        public_key: PublicKey,
        /// Shared secret
        secret: Option<String>,
    },
    /// Get public key of the signing keys
    GetPublicKey,
    /// Sign an event draft
    SignEvent(Box<UnsignedEvent>),
    /// Encrypt text (NIP04)
    Nip04Encrypt {
        /// Counterparty public key
        public_key: PublicKey,
        /// Plaintext
        text: String,
    },
    /// Decrypt text (NIP04)
    Nip04Decrypt {
        /// Counterparty public key
        public_key: PublicKey,
        /// Ciphertext
        ciphertext: String,
    },
    /// Ping
    Ping,
}

impl Request {
    /// Get the method name
    pub fn method(&self) -> &str {
        match self {
            Self::Connect { .. } => "connect",
            Self::GetPublicKey => "get_public_key",
            Self::SignEvent(..) => "sign_event",
            Self::Nip04Encrypt { .. } => "nip04_encrypt",
            Self::Nip04Decrypt { .. } => "nip04_decrypt",
            Self::Ping => "ping",
        }
    }

    /// Get the method params
    pub fn params(&self) -> Vec<String> {
        match self {
            Self::Connect { public_key, secret } => {
                let mut params: Vec<String> = vec![public_key.to_hex()];
                if let Some(secret) = secret {
                    params.push(secret.clone());
                }
                params
            }
            Self::GetPublicKey => Vec::new(),
            Self::SignEvent(unsigned) => vec![unsigned.as_json()],
            Self::Nip04Encrypt { public_key, text } => {
                vec![public_key.to_hex(), text.clone()]
            }
            Self::Nip04Decrypt {
                public_key,
                ciphertext,
            } => vec![public_key.to_hex(), ciphertext.clone()],
            Self::Ping => Vec::new(),
        }
    }

    fn from_method_and_params(method: &str, params: &[String]) -> Result<Self, Error> {
        match method {
            "connect" => {
                let public_key: &String = params.first().ok_or(Error::InvalidUri)?;
                Ok(Self::Connect {
                    public_key: PublicKey::from_hex(public_key)?,
                    secret: params.get(1).cloned(),
                })
            }
            "get_public_key" => Ok(Self::GetPublicKey),
            "sign_event" => {
                let json: &String = params.first().ok_or(Error::InvalidUri)?;
                let unsigned: UnsignedEvent = UnsignedEvent::from_json(json)?;
                Ok(Self::SignEvent(Box::new(unsigned)))
            }
            "nip04_encrypt" => {
                let public_key: &String = params.first().ok_or(Error::InvalidUri)?;
                let text: &String = params.get(1).ok_or(Error::InvalidUri)?;
                Ok(Self::Nip04Encrypt {
                    public_key: PublicKey::from_hex(public_key)?,
                    text: text.clone(),
                })
            }
            "nip04_decrypt" => {
                let public_key: &String = params.first().ok_or(Error::InvalidUri)?;
                let ciphertext: &String = params.get(1).ok_or(Error::InvalidUri)?;
                Ok(Self::Nip04Decrypt {
                    public_key: PublicKey::from_hex(public_key)?,
                    ciphertext: ciphertext.clone(),
                })
            }
            "ping" => Ok(Self::Ping),
            method => Err(Error::UnknownMethod(method.to_string())),
        }
    }
}

/// Nostr Connect message, carried NIP-04 encrypted in the content of a
/// kind-24133 event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Request
    Request {
        /// Request id
        id: String,
        /// Request
        req: Request,
    },
    /// Response
    Response {
        /// Request id this response belongs to
        id: String,
        /// Result payload
        result: Option<String>,
        /// Error reason
        error: Option<String>,
    },
}

impl Message {
    /// Compose a request with a random id
    pub fn request(req: Request) -> Self {
        let mut os_random = [0u8; 16];
        OsRng.fill_bytes(&mut os_random);
        Self::Request {
            id: hex::encode(os_random),
            req,
        }
    }

    /// Compose the `ack` response to a `connect` request
    pub fn ack(id: String) -> Self {
        Self::Response {
            id,
            result: Some(String::from("ack")),
            error: None,
        }
    }

    /// Get the message id
    pub fn id(&self) -> &str {
        match self {
            Self::Request { id, .. } => id,
            Self::Response { id, .. } => id,
        }
    }

    /// Convert to JSON [`Value`]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Request { id, req } => json!({
                "id": id,
                "method": req.method(),
                "params": req.params(),
            }),
            Self::Response { id, result, error } => json!({
                "id": id,
                "result": result,
                "error": error,
            }),
        }
    }

    /// Parse from JSON [`Value`]
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let obj = value.as_object().ok_or(Error::InvalidUri)?;

        let id: String = obj
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(Error::InvalidUri)?
            .to_string();

        if let Some(method) = obj.get("method").and_then(|v| v.as_str()) {
            let params: Vec<String> = match obj.get("params") {
                Some(params) => serde_json::from_value(params.clone())?,
                None => Vec::new(),
            };
            let req: Request = Request::from_method_and_params(method, &params)?;
            return Ok(Self::Request { id, req });
        }

        let result: Option<String> = obj
            .get("result")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let error: Option<String> = obj
            .get("error")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Self::Response { id, result, error })
    }

    /// Serialize as JSON string
    #[inline]
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    /// Deserialize from JSON string
    pub fn from_json<T>(json: T) -> Result<Self, Error>
    where
        T: AsRef<[u8]>,
    {
        let value: Value = serde_json::from_slice(json.as_ref())?;
        Self::from_value(value)
    }
}

/// Parse a `sign_event` result payload into a signed [`Event`]
pub fn event_from_result(result: &str) -> Result<Event, Error> {
    Ok(Event::from_json(result)?)
}

/// Parse a `get_public_key` result payload
pub fn public_key_from_result(result: &str) -> Result<PublicKey, Error> {
    PublicKey::from_hex(result).map_err(Error::Key)
}
