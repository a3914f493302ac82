//! In-memory cache of rewritten playlists.
//!
//! Players poll playlists every few seconds. Caching the rewritten text per
//! share and path keeps that polling off the origin for a short while.
//!
//! Every share carries a generation that [`PlaylistCache::invalidate`]
//! bumps. A request reads the generation before it loads the share and
//! only stores its playlist if the generation is unchanged, so a body
//! rendered from a record that was edited meanwhile never lands in the
//! cache.

use dashmap::DashMap;
use sharegate_common::ShareToken;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry in the playlist cache.
struct CacheEntry {
    body: Arc<str>,
    generated_at: Instant,
}

/// Thread-safe cache of rewritten playlists keyed by share and path.
pub struct PlaylistCache {
    entries: DashMap<(ShareToken, String), CacheEntry>,
    generations: DashMap<ShareToken, u64>,
    max_entries: usize,
    ttl: Duration,
}

impl PlaylistCache {
    /// Create a new playlist cache. A zero `ttl` disables caching.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            max_entries,
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.max_entries > 0
    }

    /// Get a fresh cached playlist.
    pub fn get(&self, token: &ShareToken, path: &str) -> Option<Arc<str>> {
        if !self.is_enabled() {
            return None;
        }
        let key = (token.clone(), path.to_string());
        let entry = self.entries.get(&key)?;
        if entry.generated_at.elapsed() < self.ttl {
            return Some(Arc::clone(&entry.body));
        }
        // Stale, remove it
        drop(entry);
        self.entries.remove(&key);
        None
    }

    /// Current generation of `token`. Read it before loading the share.
    pub fn generation(&self, token: &ShareToken) -> u64 {
        self.generations.get(token).map(|g| *g).unwrap_or(0)
    }

    /// Store a rewritten playlist unless `token` was invalidated after
    /// `generation` was read. Returns whether the body was stored.
    pub fn insert_if_current(
        &self,
        token: &ShareToken,
        path: &str,
        body: Arc<str>,
        generation: u64,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        // Held across the insert so a concurrent invalidate either sees the
        // new entry or rejects it.
        let current = self.generations.entry(token.clone()).or_insert(0);
        if *current != generation {
            return false;
        }
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            (token.clone(), path.to_string()),
            CacheEntry {
                body,
                generated_at: Instant::now(),
            },
        );
        true
    }

    /// Drop every playlist cached for `token` after its record changed.
    pub fn invalidate(&self, token: &ShareToken) {
        *self.generations.entry(token.clone()).or_insert(0) += 1;
        self.entries.retain(|(cached, _), _| cached != token);
    }

    /// Drop everything held for a share that no longer exists.
    pub fn forget(&self, token: &ShareToken) {
        self.generations.remove(token);
        self.entries.retain(|(cached, _), _| cached != token);
    }

    pub fn forget_many<'a, I>(&self, tokens: I)
    where
        I: IntoIterator<Item = &'a ShareToken>,
    {
        for token in tokens {
            self.forget(token);
        }
    }

    /// Remove expired entries.
    pub fn cleanup(&self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.generated_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().generated_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
