//! Cryptographic engine for the Parcel relay.
//!
//! Three concerns live here:
//!
//! - **Payload sealing**: each stored object is encrypted with its own
//!   random AES-256-GCM key. Wire format: `nonce (12 bytes) || ciphertext
//!   (includes the 16-byte GCM tag)`. Tampering is detected at open time.
//! - **Key wrapping**: the per-object key is itself encrypted under the
//!   server master key and stored beside the metadata as an
//!   `ENC[AES256-GCM,data:<b64>,iv:<b64>,tag:<b64>]` envelope. Neither
//!   store ever holds a plaintext key next to the ciphertext it opens.
//! - **Password hashing**: access passwords are stored as argon2 PHC
//!   strings; verification is constant-time and one-way.
//!
//! [`MasterKey`] and [`ObjectKey`] zeroize their material on drop and
//! have redacted `Debug` implementations.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size in bytes of the nonce prefixed to every sealed payload.
const NONCE_LEN: usize = 12;

/// Size in bytes of the GCM authentication tag.
const TAG_LEN: usize = 16;

/// Errors from sealing, opening, wrapping, and password operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The provided master key is not valid (wrong length or encoding).
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    /// A wrapped key envelope or sealed payload is malformed.
    #[error("invalid encrypted value: {0}")]
    InvalidFormat(String),

    /// Authenticated decryption failed — wrong key or corrupted data.
    #[error("decryption failed (wrong key or corrupted data)")]
    DecryptionFailed,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// A 32-byte AES-256 master key that is zeroized when dropped.
///
/// The `Debug` implementation is redacted to avoid accidental logging.
/// Raw bytes are not accessible outside this crate — all cryptographic
/// operations go through the functions in this module.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        use rand_core::RngCore;
        let mut bytes = [0u8; 32];
        rand_core::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Parse a 32-byte master key from hex or base64.
///
/// Accepts either 64 hex characters or a base64 string that decodes to
/// exactly 32 bytes.
pub fn parse_master_key(raw: &str) -> Result<MasterKey, CryptoError> {
    let trimmed = raw.trim();
    if trimmed.len() == 64
        && let Ok(bytes) = hex::decode(trimmed)
        && bytes.len() == 32
    {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(MasterKey(key));
    }
    if let Ok(bytes) = B64.decode(trimmed)
        && bytes.len() == 32
    {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(MasterKey(key));
    }
    Err(CryptoError::InvalidKey(
        "must be 32 bytes encoded as 64 hex chars or base64".to_owned(),
    ))
}

/// A per-object AES-256 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ObjectKey([u8; 32]);

impl ObjectKey {
    /// Generate a fresh random per-object key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self(key.into())
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObjectKey([REDACTED])")
    }
}

/// Seal a payload under a per-object key.
///
/// Returns `nonce (12 bytes) || ciphertext (includes 16-byte GCM tag)`.
pub fn seal_payload(key: &ObjectKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed payload, verifying the GCM tag.
///
/// Any modification of the stored bytes — nonce, ciphertext, or tag —
/// surfaces as [`CryptoError::DecryptionFailed`], never as silently
/// corrupted plaintext.
pub fn open_payload(key: &ObjectKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "sealed payload too short: {} bytes",
            sealed.len()
        )));
    }
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
    let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &sealed[NONCE_LEN..])
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Wrap a per-object key under the master key.
///
/// Produces an `ENC[AES256-GCM,data:<b64>,iv:<b64>,tag:<b64>]` envelope
/// suitable for storing in the metadata registry.
pub fn wrap_object_key(master: &MasterKey, key: &ObjectKey) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(master.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, key.0.as_slice())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // AES-GCM output = ciphertext_data || 16-byte tag
    let (data, tag) = ciphertext.split_at(ciphertext.len() - TAG_LEN);

    Ok(format!(
        "ENC[AES256-GCM,data:{},iv:{},tag:{}]",
        B64.encode(data),
        B64.encode(nonce.as_slice()),
        B64.encode(tag),
    ))
}

/// Unwrap a per-object key from its envelope using the master key.
pub fn unwrap_object_key(master: &MasterKey, envelope: &str) -> Result<ObjectKey, CryptoError> {
    let (data, iv, tag) = parse_envelope(envelope)?;

    if iv.len() != NONCE_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "IV must be {NONCE_LEN} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }

    // AES-GCM ciphertext = data || tag
    let mut ciphertext = data;
    ciphertext.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(master.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
    let nonce = Nonce::from_slice(&iv);

    let mut plaintext = cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    if plaintext.len() != 32 {
        plaintext.zeroize();
        return Err(CryptoError::InvalidFormat(format!(
            "unwrapped key must be 32 bytes, got {}",
            plaintext.len()
        )));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(ObjectKey(key))
}

/// Split an `ENC[AES256-GCM,data:..,iv:..,tag:..]` envelope into its
/// decoded fields.
fn parse_envelope(envelope: &str) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), CryptoError> {
    let trimmed = envelope.trim();
    let inner = trimmed
        .strip_prefix("ENC[AES256-GCM,")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| CryptoError::InvalidFormat("not an ENC[AES256-GCM,...] envelope".into()))?;

    let mut data = None;
    let mut iv = None;
    let mut tag = None;
    for field in inner.split(',') {
        let (name, value) = field
            .split_once(':')
            .ok_or_else(|| CryptoError::InvalidFormat(format!("malformed field: {field}")))?;
        let decoded = B64
            .decode(value)
            .map_err(|e| CryptoError::InvalidFormat(format!("invalid base64 in {name}: {e}")))?;
        match name {
            "data" => data = Some(decoded),
            "iv" => iv = Some(decoded),
            "tag" => tag = Some(decoded),
            other => {
                return Err(CryptoError::InvalidFormat(format!(
                    "unknown envelope field: {other}"
                )));
            }
        }
    }

    match (data, iv, tag) {
        (Some(d), Some(i), Some(t)) => Ok((d, i, t)),
        _ => Err(CryptoError::InvalidFormat(
            "envelope missing data, iv, or tag".into(),
        )),
    }
}

/// Hash a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

/// Verify a candidate password against an argon2 hash string.
///
/// Returns `true` if the password matches. Comparison happens inside
/// argon2's verifier, which is constant-time with respect to the hash.
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}
