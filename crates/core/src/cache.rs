//! Cache port for the graph assembler.
//!
//! The graph view is expensive to assemble for large projects, so reads go
//! through a [`GraphCache`]. Caching is strictly best-effort: implementations
//! report failures through `Result`, and the assembler degrades to live
//! recomputation on any error. Nothing here may block correctness.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Opaque cache failure. Callers never inspect it beyond logging.
#[derive(Debug)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache error: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Key/value cache abstraction injected into the graph assembler.
///
/// Values are serialized JSON strings. Entries expire after the `ttl`
/// supplied on `set`.
pub trait GraphCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-process TTL cache, the default implementation.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError(e.to_string()))?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError(e.to_string()))?;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Null implementation
// ---------------------------------------------------------------------------

/// Cache that never stores anything. Used when caching is disabled.
pub struct NullCache;

impl GraphCache for NullCache {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set("project_graph:p-1", "{}", Duration::from_secs(60))
            .unwrap();
        assert_eq!(
            cache.get("project_graph:p-1").unwrap().as_deref(),
            Some("{}")
        );

        cache.delete("project_graph:p-1").unwrap();
        assert_eq!(cache.get("project_graph:p-1").unwrap(), None);
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v", Duration::from_nanos(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        cache.set("k", "v", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }
}
