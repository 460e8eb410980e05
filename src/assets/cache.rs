use std::collections::HashMap;

use crate::assets::asset::{Asset, AssetKey, AssetStatus};

#[derive(Debug)]
struct CacheEntry {
    asset: Asset,
    holders: usize,
    waiters: Vec<String>,
}

/// `(kind, id)`-keyed asset instances shared by every project of a context.
///
/// One entry per key: repeated requests get the same [`Asset`] whatever its status.
/// `holders` counts project memberships; the entry is evicted when it drops back
/// to zero. `waiters` are the ids of projects blocked on an in-flight resolution.
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: HashMap<AssetKey, CacheEntry>,
}

impl AssetCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance for `key`, if any.
    pub fn get(&self, key: &AssetKey) -> Option<Asset> {
        self.entries.get(key).map(|e| e.asset.clone())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached asset or create a fresh `Init` one.
    ///
    /// The flag is `true` when the entry was just created.
    pub(crate) fn get_or_insert(&mut self, key: AssetKey) -> (Asset, bool) {
        if let Some(entry) = self.entries.get(&key) {
            return (entry.asset.clone(), false);
        }
        let asset = Asset::new(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                asset: asset.clone(),
                holders: 0,
                waiters: Vec::new(),
            },
        );
        (asset, true)
    }

    /// Count one more holder for `key`.
    pub(crate) fn retain(&mut self, key: &AssetKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.holders += 1;
        }
    }

    /// Drop one holder; evicts the entry when nobody holds it and nothing waits on it.
    ///
    /// Returns `true` when the entry was evicted.
    pub(crate) fn release(&mut self, key: &AssetKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.holders = entry.holders.saturating_sub(1);
        if entry.holders == 0
            && entry.waiters.is_empty()
            && entry.asset.status() != AssetStatus::Started
        {
            self.entries.remove(key);
            tracing::debug!(id = %key.id, kind = %key.kind, "asset evicted");
            return true;
        }
        false
    }

    /// Current holder count of `key`.
    pub fn holders(&self, key: &AssetKey) -> usize {
        self.entries.get(key).map_or(0, |e| e.holders)
    }

    /// Evict every settled entry nobody holds. Returns the number evicted.
    pub(crate) fn purge_unheld(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| {
            e.holders > 0
                || !e.waiters.is_empty()
                || matches!(e.asset.status(), AssetStatus::Started)
        });
        before - self.entries.len()
    }

    /// Register `project_id` as waiting for `key`; duplicates are ignored.
    pub(crate) fn add_waiter(&mut self, key: &AssetKey, project_id: &str) {
        if let Some(entry) = self.entries.get_mut(key)
            && !entry.waiters.iter().any(|w| w == project_id)
        {
            entry.waiters.push(project_id.to_string());
        }
    }

    /// Projects currently waiting on `key`.
    pub(crate) fn waiters(&self, key: &AssetKey) -> Vec<String> {
        self.entries
            .get(key)
            .map(|e| e.waiters.clone())
            .unwrap_or_default()
    }

    /// Remove and return the waiting projects of `key`.
    pub(crate) fn take_waiters(&mut self, key: &AssetKey) -> Vec<String> {
        self.entries
            .get_mut(key)
            .map(|e| std::mem::take(&mut e.waiters))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
