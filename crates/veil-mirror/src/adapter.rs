//! Adapter between the codec and client-side persistent storage.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::error::Result;
use crate::keymaterial::{DEFAULT_KEY_LEN, KeySource, SystemKeySource};

/// Mirrors one logical value into client-side persistent storage.
///
/// The mirror owns a stable storage key (the slot name in client storage)
/// and a secret used only by the codec. Only ciphertext envelopes cross the
/// trust boundary; the secret is never exposed, not even through an
/// accessor. The adapter performs no I/O itself; an external transport
/// moves envelopes to and from client storage, keyed by
/// [`storage_key`](ClientMirror::storage_key).
pub struct ClientMirror {
    storage_key: String,
    secret: String,
    default_value: Value,
}

impl ClientMirror {
    /// Create a mirror with freshly generated storage key and secret.
    pub fn new<T>(default_value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Self::with_key_source(&SystemKeySource, default_value)
    }

    /// Create a mirror drawing key material from `source`.
    ///
    /// Storage key and secret come from independent calls; the secret is
    /// never derived from the storage key.
    pub fn with_key_source<S, T>(source: &S, default_value: &T) -> Result<Self>
    where
        S: KeySource + ?Sized,
        T: Serialize + ?Sized,
    {
        Ok(Self {
            storage_key: source.generate(DEFAULT_KEY_LEN),
            secret: source.generate(DEFAULT_KEY_LEN),
            default_value: serde_json::to_value(default_value)?,
        })
    }

    /// Create a mirror with caller-supplied key material.
    pub fn with_keys<T>(
        storage_key: impl Into<String>,
        secret: impl Into<String>,
        default_value: &T,
    ) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self {
            storage_key: storage_key.into(),
            secret: secret.into(),
            default_value: serde_json::to_value(default_value)?,
        })
    }

    /// The slot this mirror occupies in client storage.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// The value used when nothing valid is stored.
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Resolve the current value from a stored envelope.
    ///
    /// Absence and an undecodable envelope both resolve to the default
    /// value: the mirror degrades to its initial state rather than
    /// surfacing an error for storage the client may have cleared,
    /// corrupted, or forged.
    pub fn load(&self, stored: Option<&str>) -> Value {
        let Some(envelope) = stored else {
            return self.default_value.clone();
        };

        match codec::decode(envelope, &self.secret) {
            Ok(value) => value,
            Err(_) => {
                debug!(
                    storage_key = %self.storage_key,
                    "stored envelope rejected, using default"
                );
                self.default_value.clone()
            }
        }
    }

    /// Encode an outgoing value for persistence under the storage key.
    pub fn prepare_for_store<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        codec::encode(value, &self.secret)
    }
}

impl fmt::Debug for ClientMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret.
        f.debug_struct("ClientMirror")
            .field("storage_key", &self.storage_key)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}
