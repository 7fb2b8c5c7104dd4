//! Results cache keyed by `(strategy_id, config_hash)`.
//!
//! Each key owns its own lock: concurrent requests for the same key wait for
//! the first computation instead of repeating it, while different keys never
//! block each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::request::ValidationResponse;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub strategy_id: String,
    /// Config hash combined with the request grid.
    pub config_hash: String,
}

type Slot = Arc<Mutex<Option<Arc<ValidationResponse>>>>;

#[derive(Debug, Default)]
pub struct ResultCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ValidationResponse>> {
        let slot = self.slots.lock().get(key).cloned()?;
        let hit = slot.lock().clone();
        hit
    }

    /// Cached response for `key`, or the result of `compute`. At most one
    /// `compute` per key runs at a time. Responses that are not cacheable
    /// (cancelled, timed out) are returned but not stored.
    pub fn get_or_compute<E, F>(&self, key: &CacheKey, compute: F) -> Result<Arc<ValidationResponse>, E>
    where
        F: FnOnce() -> Result<ValidationResponse, E>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock();
        if let Some(hit) = guard.as_ref() {
            debug!(strategy_id = %key.strategy_id, "results cache hit");
            return Ok(Arc::clone(hit));
        }

        let response = Arc::new(compute()?);
        if response.is_cacheable() {
            *guard = Some(Arc::clone(&response));
        } else {
            debug!(
                strategy_id = %key.strategy_id,
                status = ?response.status,
                "response not cached"
            );
        }
        Ok(response)
    }

    pub fn invalidate(&self, key: &CacheKey) {
        let removed = self.slots.lock().remove(key);
        if let Some(slot) = removed {
            *slot.lock() = None;
        }
    }

    /// Number of stored responses.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|s| s.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
