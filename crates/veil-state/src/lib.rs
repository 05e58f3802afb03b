//! Session-scoped ephemeral state store with TTL eviction.
//!
//! This crate maps a `(session_id, cell_id)` pair to an owned JSON value with:
//! - Optional per-cell TTL (unbounded by default); logical expiry governs
//!   visibility, so an expired cell is invisible to readers before the
//!   sweep physically removes it
//! - Deletion callbacks fired exactly once when a cell is evicted, deleted,
//!   or torn down with its session
//! - A sweep that re-checks expiry under the write lock, so a racing write
//!   resurrects a cell instead of losing it
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use veil_state::{CellOptions, SessionStore, StoreConfig};
//!
//! let store = SessionStore::new(StoreConfig::default());
//!
//! let opts = CellOptions::new().with_ttl(Duration::from_secs(30));
//! store.set_with("session-1", "draft", &"hello", opts).await?;
//! let value = store.get("session-1", "draft").await?;
//! ```

mod cell;
mod config;
mod error;
mod store;

pub use cell::{CallbackError, CellMeta, CellOptions, DeleteCallback};
pub use config::{DEFAULT_SWEEP_INTERVAL, StoreConfig};
pub use error::{Error, Result};
pub use store::{SessionStore, StoreStats};
