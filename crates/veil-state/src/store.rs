//! Session-scoped state store with TTL eviction and deletion callbacks.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cell::{CellMeta, CellOptions, StateCell};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Inner state protected by RwLock.
struct StoreInner {
    /// `session_id -> cell_id -> cell`.
    sessions: HashMap<String, HashMap<String, StateCell>>,

    /// Monotonic write sequence. Orders concurrent writes on this process
    /// without relying on wall-clock timestamps.
    next_seq: u64,
}

impl StoreInner {
    fn stamp(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Session-scoped state store.
///
/// Maps `(session_id, cell_id)` to an owned JSON value with an optional TTL
/// and a deletion callback. Visibility is governed by logical expiry: a cell
/// past its TTL reads as absent even before [`sweep`](SessionStore::sweep)
/// physically removes it.
///
/// The store is an explicit handle, cheap to clone and share across
/// request-handling contexts; sessions are independent, and per-cell writes
/// are serialized by the inner lock and ordered by a monotonic sequence.
pub struct SessionStore {
    inner: Arc<RwLock<StoreInner>>,
    config: StoreConfig,
}

impl SessionStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> Self {
        let inner = StoreInner {
            sessions: HashMap::new(),
            next_seq: 0,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of cells currently held, including expired cells the sweep has
    /// not removed yet.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.sessions.values().map(HashMap::len).sum()
    }

    /// Check if the store holds no cells.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// Read the live value of a cell.
    ///
    /// Returns [`Error::NotFound`] if the cell does not exist or has passed
    /// its TTL, whether or not it has been swept.
    pub async fn get(&self, session_id: &str, cell_id: &str) -> Result<Value> {
        let now = Instant::now();
        let inner = self.inner.read().await;

        match inner
            .sessions
            .get(session_id)
            .and_then(|cells| cells.get(cell_id))
        {
            Some(cell) if !cell.is_expired(now) => {
                trace!(session_id = %session_id, cell_id = %cell_id, "cell read");
                Ok(cell.value.clone())
            }
            _ => Err(Error::NotFound {
                session_id: session_id.to_string(),
                cell_id: cell_id.to_string(),
            }),
        }
    }

    /// Write a cell with default options (unbounded lifetime, no callback).
    ///
    /// See [`set_with`](SessionStore::set_with).
    pub async fn set<T>(&self, session_id: &str, cell_id: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.set_with(session_id, cell_id, value, CellOptions::new())
            .await
    }

    /// Write a cell, creating it if absent.
    ///
    /// The value is snapshotted into an owned JSON form before the store is
    /// touched; a value that cannot be snapshotted is rejected here with
    /// [`Error::Construction`] and no cell is created or modified.
    ///
    /// `opts` only applies when the write creates the cell. On an existing
    /// live cell the value is replaced and the expiry timer reset, while TTL
    /// and callback keep their creation-time settings. Writing to an
    /// expired-but-unswept cell re-creates it; the expired incumbent's
    /// callback fires with the value it last held.
    pub async fn set_with<T>(
        &self,
        session_id: &str,
        cell_id: &str,
        value: &T,
        opts: CellOptions,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let snapshot = serde_json::to_value(value)?;
        let now = Instant::now();

        let expired_incumbent = {
            let mut inner = self.inner.write().await;
            let seq = inner.stamp();
            let cells = inner.sessions.entry(session_id.to_string()).or_default();

            match cells.get_mut(cell_id) {
                Some(cell) if !cell.is_expired(now) => {
                    if !opts.is_empty() {
                        trace!(
                            session_id = %session_id,
                            cell_id = %cell_id,
                            "ttl/callback ignored on existing cell"
                        );
                    }
                    cell.replace(snapshot, seq);
                    trace!(session_id = %session_id, cell_id = %cell_id, "cell updated");
                    None
                }
                _ => {
                    let incumbent = cells.remove(cell_id);
                    let mut opts = opts;
                    if opts.ttl.is_none() {
                        opts.ttl = self.config.default_ttl;
                    }
                    cells.insert(cell_id.to_string(), StateCell::new(snapshot, seq, opts));
                    debug!(session_id = %session_id, cell_id = %cell_id, "cell created");
                    incumbent
                }
            }
        };

        if let Some(cell) = expired_incumbent {
            fire_delete_callback(session_id, cell_id, cell);
        }

        Ok(())
    }

    /// Remove a cell immediately, firing its callback with the last-held
    /// value. Idempotent: removing an absent cell is a no-op.
    pub async fn delete(&self, session_id: &str, cell_id: &str) {
        let removed = {
            let mut inner = self.inner.write().await;
            match inner.sessions.get_mut(session_id) {
                Some(cells) => {
                    let cell = cells.remove(cell_id);
                    if cells.is_empty() {
                        inner.sessions.remove(session_id);
                    }
                    cell
                }
                None => None,
            }
        };

        if let Some(cell) = removed {
            debug!(session_id = %session_id, cell_id = %cell_id, "cell deleted");
            fire_delete_callback(session_id, cell_id, cell);
        }
    }

    /// Remove expired cells, firing their callbacks. Returns the number of
    /// cells removed.
    ///
    /// The scan snapshots candidates under the read lock so writers are not
    /// blocked, then re-checks each candidate's write sequence and expiry
    /// under the write lock before removal. A write that lands between scan
    /// and removal bumps the sequence and resurrects the cell.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();

        let candidates: Vec<(String, String, u64)> = {
            let inner = self.inner.read().await;
            inner
                .sessions
                .iter()
                .flat_map(|(session_id, cells)| {
                    cells
                        .iter()
                        .filter(|(_, cell)| cell.is_expired(now))
                        .map(move |(cell_id, cell)| {
                            (session_id.clone(), cell_id.clone(), cell.seq)
                        })
                })
                .collect()
        };

        if candidates.is_empty() {
            return 0;
        }

        let mut removed = Vec::new();
        {
            let mut inner = self.inner.write().await;
            for (session_id, cell_id, seq) in candidates {
                let Some(cells) = inner.sessions.get_mut(&session_id) else {
                    continue;
                };

                let still_expired = cells
                    .get(&cell_id)
                    .map(|cell| cell.seq == seq && cell.is_expired(now))
                    .unwrap_or(false);
                if !still_expired {
                    continue;
                }

                if let Some(cell) = cells.remove(&cell_id) {
                    removed.push((session_id.clone(), cell_id, cell));
                }
                if cells.is_empty() {
                    inner.sessions.remove(&session_id);
                }
            }
        }

        let count = removed.len();
        for (session_id, cell_id, cell) in removed {
            debug!(session_id = %session_id, cell_id = %cell_id, "expired cell swept");
            fire_delete_callback(&session_id, &cell_id, cell);
        }

        if count > 0 {
            debug!(count = count, "sweep removed expired cells");
        }

        count
    }

    /// Remove every cell of a session, firing callbacks. Called once when
    /// the owning session ends (e.g. on disconnect).
    pub async fn teardown(&self, session_id: &str) {
        let cells = {
            let mut inner = self.inner.write().await;
            inner.sessions.remove(session_id)
        };

        let Some(cells) = cells else {
            return;
        };

        debug!(session_id = %session_id, cells = cells.len(), "session torn down");
        for (cell_id, cell) in cells {
            fire_delete_callback(session_id, &cell_id, cell);
        }
    }

    /// Check whether a live (non-expired) cell exists.
    pub async fn contains(&self, session_id: &str, cell_id: &str) -> bool {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .and_then(|cells| cells.get(cell_id))
            .map(|cell| !cell.is_expired(now))
            .unwrap_or(false)
    }

    /// Observable metadata for a live cell, or `None` if absent or expired.
    pub async fn meta(&self, session_id: &str, cell_id: &str) -> Option<CellMeta> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .and_then(|cells| cells.get(cell_id))
            .filter(|cell| !cell.is_expired(now))
            .map(StateCell::meta)
    }

    /// Get store statistics.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            sessions: inner.sessions.len(),
            cells: inner.sessions.values().map(HashMap::len).sum(),
        }
    }

    /// Spawn a background task sweeping on `config.sweep_interval`.
    ///
    /// The task runs until aborted or until the runtime shuts down.
    pub fn spawn_sweep_task(&self) -> JoinHandle<()> {
        let store = self.clone();
        let interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = store.sweep().await;
                if swept > 0 {
                    debug!(swept = swept, "periodic sweep removed expired cells");
                }
            }
        })
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of sessions with at least one cell.
    pub sessions: usize,

    /// Total number of cells across sessions.
    pub cells: usize,
}

/// Run a cell's delete callback off the mutation path.
///
/// The callback runs on its own task so a slow or failing callback cannot
/// stall eviction of other cells or hold the store lock. Errors and panics
/// are logged and contained.
fn fire_delete_callback(session_id: &str, cell_id: &str, mut cell: StateCell) {
    let Some(callback) = cell.delete_callback.take() else {
        return;
    };
    let value = cell.value;
    let session_id = session_id.to_string();
    let cell_id = cell_id.to_string();

    tokio::spawn(async move {
        match catch_unwind(AssertUnwindSafe(move || callback(value))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(
                session_id = %session_id,
                cell_id = %cell_id,
                error = %error,
                "delete callback failed"
            ),
            Err(_) => warn!(
                session_id = %session_id,
                cell_id = %cell_id,
                "delete callback panicked"
            ),
        }
    });
}
