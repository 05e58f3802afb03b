//! Authenticated encryption of JSON values for client-side storage.
//!
//! [`encode`] serializes a value to JSON bytes and seals them with
//! ChaCha20-Poly1305 under a key derived from the secret string. The result
//! is a single opaque envelope, `enc:v1:<nonce>:<ciphertext>`, with URL-safe
//! unpadded base64 parts; this envelope is the only artifact that crosses
//! the trust boundary to client storage. [`decode`] verifies the
//! authentication tag before returning any data.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Envelope format marker. Bump the version if the layout changes.
const ENVELOPE_PREFIX: &str = "enc:v1:";

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt a value into a self-contained envelope string.
///
/// A fresh nonce is drawn per call, so two encodings of the same value
/// differ; both decode to the same value.
pub fn encode<T>(value: &T, secret: &str) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let plaintext = serde_json::to_vec(value)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let aead = ChaCha20Poly1305::new_from_slice(Sha256::digest(secret.as_bytes()).as_slice())
        .map_err(|_| Error::Encrypt)?;
    let ciphertext = aead
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
        .map_err(|_| Error::Encrypt)?;

    Ok(format!(
        "{ENVELOPE_PREFIX}{}:{}",
        URL_SAFE_NO_PAD.encode(nonce_bytes),
        URL_SAFE_NO_PAD.encode(ciphertext)
    ))
}

/// Decrypt an envelope produced by [`encode`].
///
/// A malformed envelope, a tampered nonce or ciphertext, a wrong secret,
/// and non-JSON plaintext all collapse into [`Error::Decode`] so callers
/// cannot distinguish the causes. Treat it as "no stored value".
pub fn decode(envelope: &str, secret: &str) -> Result<Value> {
    let rest = envelope.strip_prefix(ENVELOPE_PREFIX).ok_or(Error::Decode)?;
    let (nonce_b64, ciphertext_b64) = rest.split_once(':').ok_or(Error::Decode)?;
    if ciphertext_b64.contains(':') {
        return Err(Error::Decode);
    }

    let nonce_bytes = URL_SAFE_NO_PAD
        .decode(nonce_b64)
        .map_err(|_| Error::Decode)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(Error::Decode);
    }
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ciphertext_b64)
        .map_err(|_| Error::Decode)?;

    let aead = ChaCha20Poly1305::new_from_slice(Sha256::digest(secret.as_bytes()).as_slice())
        .map_err(|_| Error::Decode)?;
    let plaintext = aead
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| Error::Decode)?;

    serde_json::from_slice(&plaintext).map_err(|_| Error::Decode)
}
