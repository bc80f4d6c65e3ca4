//! Encrypted session representation of the principal.
//!
//! The session slot holds `base64url(nonce || AES-256-GCM(json(principal)))`.
//! The AES key is the SHA-256 digest of the operator's token encryption key.
//! Loading never fails a request: any decoding problem is logged and the
//! request continues anonymously.

use crate::config::{FlowConfig, TokenEncryptionKey};
use crate::endpoint::Endpoints;
use crate::error::SessionError;
use crate::principal::{ClientBinding, Principal};
use aes_gcm::aead::{Aead, KeyInit, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rootcause::prelude::Report;
use sha2::{Digest, Sha256};
use std::fmt;

/// AES-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// Fixed key of the principal in the session store.
pub const SESSION_KEY: &str = "webflow.principal";

/// The opaque session slot attached to a request.
pub trait SessionSlot {
    /// Returns the stored blob, if any.
    fn get(&self) -> Option<&str>;

    /// Replaces the stored blob; `None` clears the slot.
    fn put(&mut self, value: Option<String>);
}

impl SessionSlot for Option<String> {
    fn get(&self) -> Option<&str> {
        self.as_deref()
    }

    fn put(&mut self, value: Option<String>) {
        *self = value;
    }
}

/// What `persist` decided for the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// Store the encrypted blob.
    Store(String),
    /// The principal logged out: clear the slot.
    Clear,
}

impl Persisted {
    /// Returns the value to put into the slot.
    #[must_use]
    pub fn into_slot_value(self) -> Option<String> {
        match self {
            Self::Store(blob) => Some(blob),
            Self::Clear => None,
        }
    }
}

/// Authenticated encryption of session blobs.
#[derive(Clone)]
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Derives the cipher from the operator key.
    #[must_use]
    pub fn new(key: &TokenEncryptionKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&digest),
        }
    }

    /// Encrypts a payload into a slot-safe string.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, Report<SessionError>> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| SessionError::Encode {
                details: e.to_string(),
            })?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypts a string produced by [`SessionCipher::seal`].
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, Report<SessionError>> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed.trim())
            .map_err(|e| SessionError::Decode {
                details: e.to_string(),
            })?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SessionError::Decode {
                details: "blob too short".to_string(),
            }
            .into());
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::Decode {
                details: "authentication failed".to_string(),
            })?;
        Ok(plaintext)
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCipher")
    }
}

/// Converts principals to and from session blobs.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    cipher: SessionCipher,
    endpoints: Endpoints,
    api_version: String,
    debugging: bool,
}

impl SessionCodec {
    /// Creates a codec for a validated configuration.
    #[must_use]
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            cipher: SessionCipher::new(config.token_encryption_key()),
            endpoints: config.endpoints().clone(),
            api_version: config.api_version().to_string(),
            debugging: config.debugging(),
        }
    }

    /// Prepares a principal for the session.
    ///
    /// A logged-out principal yields [`Persisted::Clear`]. Otherwise
    /// `last_seen` is stamped on the caller's principal and the blob is
    /// produced from a copy without the client binding.
    pub fn persist(&self, principal: &mut Principal) -> Result<Persisted, Report<SessionError>> {
        if principal.is_logged_out() {
            return Ok(Persisted::Clear);
        }

        principal.touch(Utc::now());
        let payload =
            serde_json::to_vec(&principal.unbound()).map_err(|e| SessionError::Encode {
                details: e.to_string(),
            })?;
        Ok(Persisted::Store(self.cipher.seal(&payload)?))
    }

    /// Restores a principal from a session blob.
    ///
    /// Returns `None` for an empty slot, for any decoding failure, and for
    /// principals whose endpoint is no longer configured. Failures are
    /// logged, never propagated.
    #[must_use]
    pub fn load(&self, blob: Option<&str>) -> Option<Principal> {
        let blob = blob.filter(|b| !b.trim().is_empty())?;
        match self.try_load(blob) {
            Ok(principal) => Some(principal),
            Err(report) => {
                tracing::warn!(error = %report, "discarding session principal");
                None
            }
        }
    }

    fn try_load(&self, blob: &str) -> Result<Principal, Report<SessionError>> {
        let plaintext = self.cipher.open(blob)?;
        let mut principal: Principal =
            serde_json::from_slice(&plaintext).map_err(|e| SessionError::Decode {
                details: e.to_string(),
            })?;

        let (_, credentials) = self
            .endpoints
            .get(principal.endpoint().as_str())
            .ok_or_else(|| SessionError::StaleEndpoint {
                endpoint: principal.endpoint().to_string(),
            })?;

        principal.bind(ClientBinding::new(
            credentials,
            &self.api_version,
            self.debugging,
        ));

        if self.debugging {
            tracing::info!(
                endpoint = %principal.endpoint(),
                user_id = %principal.user_id(),
                "restored principal from session"
            );
        }
        Ok(principal)
    }

    /// Writes a principal to the slot after a request.
    ///
    /// An absent principal leaves the slot untouched. The slot is written
    /// only when the new value differs from the stored one.
    pub fn save(
        &self,
        slot: &mut impl SessionSlot,
        principal: Option<&mut Principal>,
    ) -> Result<(), Report<SessionError>> {
        let Some(principal) = principal else {
            return Ok(());
        };

        let value = self.persist(principal)?.into_slot_value();
        if value.as_deref() != slot.get() {
            slot.put(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webflow_core::{EndpointId, OrgId, UserId};

    const KEY: &str = "9rg/hsK8ZSi+jc8R40ruJQ==";

    fn config() -> FlowConfig {
        FlowConfig::builder(KEY)
            .endpoint("login.example.com", "K1", "S1")
            .endpoint("test.example.com", "K2", "S2")
            .build()
            .expect("valid config")
    }

    fn principal(endpoint: &str) -> Principal {
        Principal::new(
            EndpointId::from(endpoint),
            OrgId::from("org_id"),
            UserId::from("user_id"),
            "https://ap1.example.com",
            "access",
        )
        .with_refresh_token("refresh")
    }

    #[test]
    fn persist_then_load_round_trips() {
        let codec = SessionCodec::new(&config());
        let mut original = principal("test.example.com");
        original.set_attribute("username", "sales king");

        let blob = match codec.persist(&mut original).expect("persist") {
            Persisted::Store(blob) => blob,
            Persisted::Clear => panic!("principal is not logged out"),
        };
        assert!(original.last_seen().is_some());

        let loaded = codec.load(Some(&blob)).expect("principal");
        assert_eq!(loaded.unbound(), original.unbound());
        assert_eq!(loaded.client_id(), Some("K2"));
        assert_eq!(loaded.client_secret(), Some("S2"));
        assert_eq!(loaded.api_version(), Some("25.0"));
        assert_eq!(loaded.attribute("username"), Some("sales king"));
    }

    #[test]
    fn transient_fields_come_from_current_config() {
        let codec = SessionCodec::new(&config());
        let mut original = principal("login.example.com");
        original.bind(ClientBinding {
            client_id: "stale-id".to_string(),
            client_secret: "stale-secret".to_string(),
            api_version: "1.0".to_string(),
            debugging: true,
        });

        let blob = codec
            .persist(&mut original)
            .expect("persist")
            .into_slot_value()
            .expect("blob");
        let plaintext = SessionCipher::new(config().token_encryption_key())
            .open(&blob)
            .expect("open");
        let json = String::from_utf8(plaintext).expect("utf8");
        assert!(!json.contains("stale-secret"));
        assert!(!json.contains("stale-id"));

        let loaded = codec.load(Some(&blob)).expect("principal");
        let binding = loaded.client().expect("binding");
        assert_eq!(binding.client_id, "K1");
        assert_eq!(binding.client_secret, "S1");
        assert_eq!(binding.api_version, "25.0");
        assert!(!binding.debugging);
    }

    #[test]
    fn logout_clears_slot() {
        let codec = SessionCodec::new(&config());
        let mut first = principal("login.example.com");
        let mut slot: Option<String> = None;
        codec.save(&mut slot, Some(&mut first)).expect("save");
        assert!(slot.is_some());

        let mut loaded = codec.load(slot.get()).expect("principal");
        loaded.logout();
        assert_eq!(codec.persist(&mut loaded.clone()).expect("persist"), Persisted::Clear);

        codec.save(&mut slot, Some(&mut loaded)).expect("save");
        assert!(slot.is_none());
        assert!(codec.load(slot.get()).is_none());
    }

    #[test]
    fn absent_principal_leaves_slot_untouched() {
        let codec = SessionCodec::new(&config());
        let mut slot = Some("opaque".to_string());
        codec.save(&mut slot, None).expect("save");
        assert_eq!(slot.as_deref(), Some("opaque"));
    }

    #[test]
    fn empty_slot_is_anonymous() {
        let codec = SessionCodec::new(&config());
        assert!(codec.load(None).is_none());
        assert!(codec.load(Some("")).is_none());
    }

    #[test]
    fn corrupted_blob_is_anonymous() {
        let codec = SessionCodec::new(&config());
        let blob = codec
            .persist(&mut principal("login.example.com"))
            .expect("persist")
            .into_slot_value()
            .expect("blob");

        let mut raw = URL_SAFE_NO_PAD.decode(&blob).expect("base64");
        let middle = raw.len() / 2;
        raw[middle] ^= 0x01;
        let corrupted = URL_SAFE_NO_PAD.encode(raw);

        assert!(codec.load(Some(&corrupted)).is_none());
        assert!(codec.load(Some("not base64 at all!")).is_none());
    }

    #[test]
    fn wrong_key_is_anonymous() {
        let codec = SessionCodec::new(&config());
        let blob = codec
            .persist(&mut principal("login.example.com"))
            .expect("persist")
            .into_slot_value()
            .expect("blob");

        let other = FlowConfig::builder("a-completely-different-key")
            .endpoint("login.example.com", "K1", "S1")
            .build()
            .expect("valid config");
        assert!(SessionCodec::new(&other).load(Some(&blob)).is_none());
    }

    #[test]
    fn removed_endpoint_discards_principal() {
        let codec = SessionCodec::new(&config());
        let blob = codec
            .persist(&mut principal("test.example.com"))
            .expect("persist")
            .into_slot_value()
            .expect("blob");

        let reduced = FlowConfig::builder(KEY)
            .endpoint("login.example.com", "K1", "S1")
            .build()
            .expect("valid config");
        assert!(SessionCodec::new(&reduced).load(Some(&blob)).is_none());
    }

    #[test]
    fn blobs_are_freshly_encrypted() {
        let cipher = SessionCipher::new(&TokenEncryptionKey::new(KEY));
        let a = cipher.seal(b"same").expect("seal");
        let b = cipher.seal(b"same").expect("seal");
        assert_ne!(a, b);
        assert_eq!(cipher.open(&a).expect("open"), b"same");
    }
}
