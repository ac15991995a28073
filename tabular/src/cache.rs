//! FILENAME: tabular/src/cache.rs
//! The cache collaborator.
//!
//! The external cache service speaks bytes and TTLs and is strictly
//! best-effort: a write may silently fail, a read may miss at any time.
//! Cached values are recomputable, so racing writers for the same key
//! are tolerated (last writer wins).

use rustc_hash::FxHashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Byte-oriented cache with per-entry TTL. Both operations are
/// best-effort; neither may fail the request that issued them.
pub trait ByteCache: Send + Sync {
    /// Returns the payload if present and unexpired.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores a payload for `ttl`. May silently drop the write.
    fn put(&self, key: &str, value: &[u8], ttl: Duration);
}

/// In-memory [`ByteCache`] with lazy expiry, used by tests and as a
/// process-local cache when no external service is wired up.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<FxHashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(_) => return None, // poisoned lock behaves as a miss
        };
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        }
    }
}
