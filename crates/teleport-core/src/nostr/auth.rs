//! Signing identities and their lifecycle.
//!
//! Three modes select the active identity:
//! - `extension`: an external `NostrSigner` (NIP-46 bunker, platform signer)
//!   supplied at construction. No secret material is held locally.
//! - `local`: a user-supplied secret, either bech32 `nsec1…` or 64 hex digits.
//! - `auto`: an ephemeral secret generated on first use and persisted under
//!   `EPHEMERAL_KEY_STORAGE_KEY`, reused on every later activation.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ::bech32::primitives::decode::UncheckedHrpstring;
use ::bech32::Bech32;
use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::EPHEMERAL_KEY_STORAGE_KEY;
use crate::error::CoreError;
use crate::store::LocalStorage;

const NSEC_HRP: &str = "nsec";
const NSEC_PREFIX: &str = "nsec1";
/// 32 bytes as 52 five-bit groups, plus the 6-character checksum
const NSEC_DATA_CHARS: usize = 58;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    Extension,
    Local,
    #[default]
    Auto,
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigningMode::Extension => "extension",
            SigningMode::Local => "local",
            SigningMode::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extension" | "bunker" => Ok(SigningMode::Extension),
            "local" => Ok(SigningMode::Local),
            "auto" | "ephemeral" => Ok(SigningMode::Auto),
            other => Err(format!("unknown signing mode: {other}")),
        }
    }
}

/// Unsigned event content handed to an identity for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    pub kind: u16,
    pub created_at: u64,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl EventTemplate {
    fn into_builder(self) -> EventBuilder {
        let tags = self.tags.into_iter().filter_map(|mut parts| {
            if parts.is_empty() {
                return None;
            }
            let name = parts.remove(0);
            Some(Tag::custom(TagKind::Custom(Cow::Owned(name)), parts))
        });
        EventBuilder::new(Kind::from(self.kind), self.content)
            .tags(tags)
            .custom_created_at(Timestamp::from(self.created_at))
    }
}

/// The active signing identity. Every variant signs through `sign`.
#[derive(Clone)]
pub enum Identity {
    External(Arc<dyn NostrSigner>),
    UserSecret(Keys),
    Ephemeral(Keys),
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::External(_) => f.write_str("Identity::External"),
            Identity::UserSecret(keys) => write!(f, "Identity::UserSecret({})", keys.public_key()),
            Identity::Ephemeral(keys) => write!(f, "Identity::Ephemeral({})", keys.public_key()),
        }
    }
}

impl Identity {
    /// Public key of the signer. For external signers this is a round trip.
    pub async fn public_key(&self) -> Result<PublicKey, CoreError> {
        match self {
            Identity::External(signer) => signer
                .get_public_key()
                .await
                .map_err(|e| CoreError::Signing(e.to_string())),
            Identity::UserSecret(keys) | Identity::Ephemeral(keys) => Ok(keys.public_key()),
        }
    }

    /// NIP-01 finalize: id = sha256 of the canonical serialization, Schnorr
    /// signature over the id, author = this identity's public key.
    pub async fn sign(&self, template: EventTemplate) -> Result<Event, CoreError> {
        let builder = template.into_builder();
        match self {
            Identity::External(signer) => {
                let public_key = self.public_key().await?;
                signer
                    .sign_event(builder.build(public_key))
                    .await
                    .map_err(|e| CoreError::Signing(e.to_string()))
            }
            Identity::UserSecret(keys) | Identity::Ephemeral(keys) => builder
                .sign_with_keys(keys)
                .map_err(|e| CoreError::Signing(e.to_string())),
        }
    }
}

/// Parse a user-supplied secret. Accepts `nsec1…` (checksum not verified) or
/// 64 hex digits with an optional `0x` prefix. Invalid input yields `None`.
pub fn parse_secret(input: &str) -> Option<SecretKey> {
    let trimmed = input.trim();
    let has_nsec_prefix = trimmed
        .get(..NSEC_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(NSEC_PREFIX));
    if has_nsec_prefix {
        return decode_nsec_unchecked(trimmed);
    }

    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 64 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    SecretKey::from_slice(&bytes).ok()
}

/// Decode an `nsec1…` string without validating its checksum.
fn decode_nsec_unchecked(input: &str) -> Option<SecretKey> {
    let input = input.to_ascii_lowercase();
    let unchecked = UncheckedHrpstring::new(&input).ok()?;
    if unchecked.hrp().to_string() != NSEC_HRP {
        return None;
    }
    // `remove_checksum` assumes the data part holds a full payload plus checksum
    let (_, data_part) = input.rsplit_once('1')?;
    if data_part.len() != NSEC_DATA_CHARS {
        return None;
    }
    let bytes: Vec<u8> = unchecked.remove_checksum::<Bech32>().byte_iter().collect();
    SecretKey::from_slice(&bytes).ok()
}

pub struct KeyManager {
    mode: SigningMode,
    storage: Arc<dyn LocalStorage>,
    external: Option<Arc<dyn NostrSigner>>,
    local_keys: Option<Keys>,
    ephemeral_keys: Option<Keys>,
}

impl KeyManager {
    pub fn new(
        mode: SigningMode,
        storage: Arc<dyn LocalStorage>,
        external: Option<Arc<dyn NostrSigner>>,
    ) -> Self {
        if mode == SigningMode::Extension && external.is_none() {
            tracing::warn!("key_manager: extension mode selected but no external signer present");
        }
        Self {
            mode,
            storage,
            external,
            local_keys: None,
            ephemeral_keys: None,
        }
    }

    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SigningMode) {
        self.mode = mode;
    }

    /// Whether an external signer was supplied.
    pub fn extension_available(&self) -> bool {
        self.external.is_some()
    }

    /// Replace the local secret. Returns whether `input` parsed to a valid key;
    /// invalid input clears the local identity.
    pub fn set_local_secret(&mut self, input: &str) -> bool {
        self.local_keys = parse_secret(input).map(Keys::new);
        self.local_keys.is_some()
    }

    pub fn has_local_secret(&self) -> bool {
        self.local_keys.is_some()
    }

    /// Resolve the identity for the current mode. Activating `auto` mode
    /// loads or creates the persisted ephemeral key.
    pub fn active_identity(&mut self) -> Option<Identity> {
        match self.mode {
            SigningMode::Extension => self.external.clone().map(Identity::External),
            SigningMode::Local => self.local_keys.clone().map(Identity::UserSecret),
            SigningMode::Auto => Some(Identity::Ephemeral(self.ephemeral_keys())),
        }
    }

    /// Sign `template` with the active identity.
    pub async fn sign(&mut self, template: EventTemplate) -> Result<Event, CoreError> {
        let identity = self
            .active_identity()
            .ok_or(CoreError::SigningUnavailable)?;
        identity.sign(template).await
    }

    /// The ephemeral keys, loading or generating and persisting them on first use.
    pub fn ephemeral_keys(&mut self) -> Keys {
        if let Some(keys) = &self.ephemeral_keys {
            return keys.clone();
        }

        let keys = match self.load_persisted_ephemeral() {
            Some(secret) => Keys::new(secret),
            None => {
                let keys = Keys::generate();
                self.persist_ephemeral(&keys);
                tracing::info!(
                    "key_manager: generated ephemeral identity {}",
                    keys.public_key()
                );
                keys
            }
        };
        self.ephemeral_keys = Some(keys.clone());
        keys
    }

    /// Forget the ephemeral key, in memory and in storage.
    pub fn clear_ephemeral(&mut self) {
        self.ephemeral_keys = None;
        if let Err(e) = self.storage.remove(EPHEMERAL_KEY_STORAGE_KEY) {
            tracing::warn!("key_manager: failed to clear ephemeral key: {}", e);
        }
    }

    fn load_persisted_ephemeral(&self) -> Option<SecretKey> {
        let raw = self.storage.get(EPHEMERAL_KEY_STORAGE_KEY)?;
        // Stored as a JSON string; accept a bare hex value as well.
        let hex_secret = serde_json::from_str::<String>(&raw).unwrap_or(raw);
        let secret = parse_secret(&hex_secret);
        if secret.is_none() {
            tracing::warn!("key_manager: persisted ephemeral key is unreadable, replacing it");
        }
        secret
    }

    fn persist_ephemeral(&self, keys: &Keys) {
        let encoded = match serde_json::to_string(&keys.secret_key().to_secret_hex()) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("key_manager: failed to encode ephemeral key: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(EPHEMERAL_KEY_STORAGE_KEY, &encoded) {
            tracing::warn!("key_manager: failed to persist ephemeral key: {}", e);
        }
    }
}
