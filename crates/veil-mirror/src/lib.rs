//! Encrypted client-storage mirror for session values.
//!
//! Round-trips a JSON value through authenticated encryption so it can live
//! in client-side persistent storage without the client being able to read
//! or forge it. Three pieces:
//!
//! - [`keymaterial`]: random alphanumeric storage keys and secrets
//! - [`codec`]: ChaCha20-Poly1305 envelope encode/decode
//! - [`ClientMirror`]: the pure adapter between the codec and whatever
//!   transport moves envelopes to and from client storage
//!
//! # Example
//!
//! ```rust,ignore
//! use veil_mirror::ClientMirror;
//!
//! let mirror = ClientMirror::new(&"light")?;
//! let envelope = mirror.prepare_for_store(&"dark")?;
//! // ... transport stores `envelope` under mirror.storage_key() ...
//! assert_eq!(mirror.load(Some(&envelope)), "dark");
//! assert_eq!(mirror.load(None), "light");
//! ```

mod adapter;
pub mod codec;
mod error;
pub mod keymaterial;

pub use adapter::ClientMirror;
pub use error::{Error, Result};
pub use keymaterial::{DEFAULT_KEY_LEN, KeySource, SystemKeySource};
