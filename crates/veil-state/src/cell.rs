//! State cell entry and creation-time options.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Error a delete callback may return. Captured and logged, never propagated
/// to the caller that triggered the removal.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked with a cell's last-held value when the cell is removed.
///
/// `FnOnce` makes at-most-once invocation a property of the type: the box is
/// consumed the first time the cell is evicted, deleted, or torn down.
pub type DeleteCallback = Box<dyn FnOnce(Value) -> Result<(), CallbackError> + Send + Sync + 'static>;

/// One ephemeral server-side state slot.
pub(crate) struct StateCell {
    /// Owned snapshot of the stored value; never aliases caller state.
    pub(crate) value: Value,

    /// When the cell was first created.
    pub(crate) created_at: DateTime<Utc>,

    /// When the cell was last written.
    pub(crate) updated_at: DateTime<Utc>,

    /// Monotonic time of the last write; expiry arithmetic uses this,
    /// not the wall clock.
    pub(crate) last_write: Instant,

    /// Store-wide write sequence stamped at the last write.
    pub(crate) seq: u64,

    /// `None` means the cell never expires.
    pub(crate) ttl: Option<Duration>,

    /// Invoked with the last-held value on removal.
    pub(crate) delete_callback: Option<DeleteCallback>,
}

impl StateCell {
    pub(crate) fn new(value: Value, seq: u64, opts: CellOptions) -> Self {
        let now = Utc::now();
        Self {
            value,
            created_at: now,
            updated_at: now,
            last_write: Instant::now(),
            seq,
            ttl: opts.ttl,
            delete_callback: opts.on_delete,
        }
    }

    /// Replace the value and reset the expiry timer. TTL and callback are
    /// fixed at creation and left unchanged.
    pub(crate) fn replace(&mut self, value: Value, seq: u64) {
        self.value = value;
        self.updated_at = Utc::now();
        self.last_write = Instant::now();
        self.seq = seq;
    }

    /// Whether the cell has passed its TTL as of `now`.
    ///
    /// A cell written at `t0` with TTL `T` is live for `t in [t0, t0 + T)`
    /// and expired from `t0 + T` on.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => now.duration_since(self.last_write) >= ttl,
        }
    }

    pub(crate) fn meta(&self) -> CellMeta {
        CellMeta {
            created_at: self.created_at,
            updated_at: self.updated_at,
            ttl: self.ttl,
        }
    }
}

/// Creation-time options for a cell.
///
/// TTL and delete callback are fixed when the cell is first created; later
/// writes to the same cell only replace the value. A session/cell pair is
/// one continuous logical state, so re-specifying these on an existing cell
/// is a no-op on those fields.
#[derive(Default)]
pub struct CellOptions {
    pub(crate) ttl: Option<Duration>,
    pub(crate) on_delete: Option<DeleteCallback>,
}

impl CellOptions {
    /// Create empty options: unbounded lifetime, no callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the cell this long after its last write.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Invoke `f` with the last-held value when the cell is removed.
    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_delete = Some(Box::new(f));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ttl.is_none() && self.on_delete.is_none()
    }
}

/// Observable metadata for a live cell.
#[derive(Debug, Clone, Copy)]
pub struct CellMeta {
    /// When the cell was first created.
    pub created_at: DateTime<Utc>,

    /// When the cell was last written.
    pub updated_at: DateTime<Utc>,

    /// Configured TTL (`None` = unbounded).
    pub ttl: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unbounded_never_expires() {
        let cell = StateCell::new(json!(1), 0, CellOptions::new());
        let far_future = Instant::now() + Duration::from_secs(86_400);
        assert!(!cell.is_expired(far_future));
    }

    #[test]
    fn test_expired_at_exactly_ttl() {
        let cell = StateCell::new(
            json!(1),
            0,
            CellOptions::new().with_ttl(Duration::from_millis(20)),
        );
        assert!(!cell.is_expired(cell.last_write));
        assert!(!cell.is_expired(cell.last_write + Duration::from_millis(19)));
        assert!(cell.is_expired(cell.last_write + Duration::from_millis(20)));
        assert!(cell.is_expired(cell.last_write + Duration::from_secs(1)));
    }

    #[test]
    fn test_replace_resets_expiry_window() {
        let mut cell = StateCell::new(
            json!(1),
            0,
            CellOptions::new().with_ttl(Duration::from_millis(20)),
        );
        let deadline = cell.last_write + Duration::from_millis(20);
        cell.replace(json!(2), 1);
        // New write window opens at the new last_write.
        assert!(!cell.is_expired(deadline));
        assert_eq!(cell.value, json!(2));
        assert_eq!(cell.seq, 1);
    }

    #[test]
    fn test_options_do_not_replace_ttl_on_existing_cell() {
        let mut cell = StateCell::new(
            json!(1),
            0,
            CellOptions::new().with_ttl(Duration::from_millis(20)),
        );
        cell.replace(json!(2), 1);
        assert_eq!(cell.ttl, Some(Duration::from_millis(20)));
    }
}
