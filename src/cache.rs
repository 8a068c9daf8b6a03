//! Two distinct caches used by the pipeline:
//!
//! - [`StatementCacheScope`]: a per-thread, per-call cache of parsed
//!   [`Statement`] values keyed by exact SQL text, scoped to one `validate`
//!   call so repeated `parse(sql)` calls within it return the same AST
//!   reference, and cleared on drop so nothing leaks across calls on a
//!   pooled thread.
//! - [`DedupCache`]: a bounded, TTL-expiring, thread-safe cache of recently
//!   seen SQL fingerprints, used by the deduplication filter (C2) to skip
//!   re-validating the same query issued in rapid succession.

use std::{
    cell::RefCell,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    rc::Rc,
    sync::Mutex,
    time::{Duration, Instant}
};

use indexmap::IndexMap;

use crate::{context::ParseMode, error::AppResult, parser::SqlParserFacade, statement::Statement};

thread_local! {
    static STATEMENT_CACHE: RefCell<std::collections::HashMap<String, Rc<Statement>>> =
        RefCell::new(std::collections::HashMap::new());
}

/// Guard that clears the thread-local statement cache when dropped.
///
/// `validate`/`rewrite` construct one of these at the top of the call;
/// dropping it (including on an early return via `?`) guarantees the
/// resource-hygiene invariant: no parsed AST outlives the call that produced
/// it on a pooled thread.
#[must_use = "the statement cache is cleared when this guard drops, hold it for the call's duration"]
pub struct StatementCacheScope {
    _private: ()
}

impl StatementCacheScope {
    pub fn enter() -> Self {
        Self {
            _private: ()
        }
    }

    /// Parse `sql`, returning the cached AST if this scope already parsed
    /// the exact same text, otherwise parsing fresh and caching the result.
    pub fn get_or_parse(
        &self,
        facade: &SqlParserFacade,
        sql: &str,
        mode: ParseMode
    ) -> AppResult<Rc<Statement>> {
        if let Some(hit) = STATEMENT_CACHE.with(|cache| cache.borrow().get(sql).cloned()) {
            return Ok(hit);
        }
        let parsed = Rc::new(facade.parse(sql, mode)?);
        STATEMENT_CACHE.with(|cache| {
            cache.borrow_mut().insert(sql.to_string(), parsed.clone());
        });
        Ok(parsed)
    }
}

impl Drop for StatementCacheScope {
    fn drop(&mut self) {
        STATEMENT_CACHE.with(|cache| cache.borrow_mut().clear());
    }
}

fn fingerprint(sql: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    sql.trim().hash(&mut hasher);
    hasher.finish()
}

struct DedupInner {
    entries: IndexMap<u64, Instant>
}

/// Bounded, TTL-expiring cache of recently validated SQL fingerprints.
///
/// Shared across threads (unlike the statement cache): a single `Mutex`
/// guards the map, trading the spec's "tolerate concurrent reads" language
/// for a simple bounded-memory implementation that never blocks for longer
/// than an insert/evict — acceptable for a cache whose entire purpose is to
/// skip work, not gate correctness.
pub struct DedupCache {
    inner:    Mutex<DedupInner>,
    capacity: usize,
    ttl:      Duration
}

impl DedupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(DedupInner {
                entries: IndexMap::with_capacity(capacity)
            }),
            capacity,
            ttl
        }
    }

    /// Returns `true` if `sql_key` was last seen within the TTL window. On a
    /// miss, records `sql_key` with a fresh expiry and returns `false`,
    /// evicting the oldest entry first if the cache is at capacity.
    pub fn should_skip(&self, sql_key: &str) -> bool {
        let key = fingerprint(sql_key);
        let now = Instant::now();
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        };

        if let Some(expiry) = inner.entries.get(&key).copied() {
            inner.entries.shift_remove(&key);
            if expiry > now {
                inner.entries.insert(key, expiry);
                return true;
            }
        }

        if inner.entries.len() >= self.capacity {
            inner.entries.shift_remove_index(0);
        }
        inner.entries.insert(key, now + self.ttl);
        false
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupCache {
    /// Default bounds from the spec: 1000 entries, 100ms TTL.
    fn default() -> Self {
        Self::new(1000, Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::context::ParseMode;

    #[test]
    fn statement_cache_returns_same_reference_within_scope() {
        let scope = StatementCacheScope::enter();
        let facade = SqlParserFacade::new();
        let a = scope
            .get_or_parse(&facade, "SELECT 1", ParseMode::Strict)
            .unwrap();
        let b = scope
            .get_or_parse(&facade, "SELECT 1", ParseMode::Strict)
            .unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn statement_cache_clears_on_drop() {
        {
            let scope = StatementCacheScope::enter();
            let facade = SqlParserFacade::new();
            scope
                .get_or_parse(&facade, "SELECT 1", ParseMode::Strict)
                .unwrap();
        }
        let is_empty = STATEMENT_CACHE.with(|c| c.borrow().is_empty());
        assert!(is_empty);
    }

    #[test]
    fn dedup_cache_skips_within_ttl() {
        let cache = DedupCache::new(10, Duration::from_millis(50));
        assert!(!cache.should_skip("SELECT 1"));
        assert!(cache.should_skip("SELECT 1"));
    }

    #[test]
    fn dedup_cache_expires_after_ttl() {
        let cache = DedupCache::new(10, Duration::from_millis(5));
        assert!(!cache.should_skip("SELECT 1"));
        thread::sleep(Duration::from_millis(20));
        assert!(!cache.should_skip("SELECT 1"));
    }

    #[test]
    fn dedup_cache_evicts_when_over_capacity() {
        let cache = DedupCache::new(2, Duration::from_secs(60));
        assert!(!cache.should_skip("a"));
        assert!(!cache.should_skip("b"));
        assert!(!cache.should_skip("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn dedup_cache_tolerates_concurrent_access() {
        let cache = std::sync::Arc::new(DedupCache::new(100, Duration::from_millis(50)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        cache.should_skip(&format!("query-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
