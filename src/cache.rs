use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AuditError, Result};
use crate::fetch::{DocumentSource, MetadataFetcher};
use crate::model::PageMetadata;

pub const METADATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DOCUMENT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 2000;

/// Key/value store with per-entry expiry. Failures degrade to a miss.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str, ttl: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
}

// ── SQLite ──

pub struct SqliteCache {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Cache(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                stored_at  INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cache_stored_at ON cache(stored_at);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: DEFAULT_MAX_ENTRIES,
        })
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Cache("connection mutex poisoned".into()))
    }

    fn try_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now_ms()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn try_put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.lock()?;
        let now = now_ms();
        conn.execute(
            "INSERT OR REPLACE INTO cache (key, value, stored_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, now, now + ttl.as_millis() as i64],
        )?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        if count as usize > self.max_entries {
            let evict = count / 2;
            conn.execute(
                "DELETE FROM cache WHERE key IN (
                    SELECT key FROM cache ORDER BY stored_at ASC, rowid ASC LIMIT ?1
                 )",
                params![evict],
            )?;
            debug!("Cache over {} entries, evicted {}", self.max_entries, evict);
        }
        Ok(())
    }

    /// Remove expired rows, returning how many were deleted.
    pub fn prune_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM cache WHERE expires_at <= ?1", params![now_ms()])?;
        Ok(n)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;
        let (entries, expired): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(expires_at <= ?1), 0) FROM cache",
            params![now_ms()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CacheStats {
            entries: entries as usize,
            expired: expired as usize,
        })
    }

    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM cache", [])?)
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, key: &str) -> Option<String> {
        self.try_get(key).unwrap_or_else(|e| {
            warn!("Cache read failed for {}: {}", key, e);
            None
        })
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.try_put(key, value, ttl) {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ── Memory ──

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, i64)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now_ms())
            .map(|(value, _)| value.clone())
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let expires_at = now_ms() + ttl.as_millis() as i64;
            entries.insert(key.to_string(), (value.to_string(), expires_at));
        }
    }
}

// ── Decorators ──

pub struct CachedMetadataFetcher {
    inner: Arc<dyn MetadataFetcher>,
    store: Arc<dyn CacheStore>,
}

impl CachedMetadataFetcher {
    pub fn new(inner: Arc<dyn MetadataFetcher>, store: Arc<dyn CacheStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl MetadataFetcher for CachedMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<PageMetadata> {
        let key = format!("scrape_{}", url);
        if let Some(raw) = self.store.get(&key) {
            match serde_json::from_str::<PageMetadata>(&raw) {
                Ok(meta) => {
                    debug!("Cache hit {}", key);
                    return Ok(meta);
                }
                Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let meta = self.inner.fetch(url).await?;
        if !meta.error {
            match serde_json::to_string(&meta) {
                Ok(raw) => self.store.put(&key, &raw, METADATA_TTL),
                Err(e) => warn!("Could not serialize metadata for {}: {}", url, e),
            }
        }
        Ok(meta)
    }
}

pub struct CachedDocumentSource {
    inner: Arc<dyn DocumentSource>,
    store: Arc<dyn CacheStore>,
}

impl CachedDocumentSource {
    pub fn new(inner: Arc<dyn DocumentSource>, store: Arc<dyn CacheStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl DocumentSource for CachedDocumentSource {
    async fn fetch_document(&self, url: &str) -> Result<String> {
        let key = format!("newsletter_{}", url);
        if let Some(markup) = self.store.get(&key) {
            debug!("Cache hit {}", key);
            return Ok(markup);
        }
        let markup = self.inner.fetch_document(url).await?;
        self.store.put(&key, &markup, DOCUMENT_TTL);
        Ok(markup)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        error_flag: bool,
    }

    #[async_trait]
    impl MetadataFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<PageMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("down") {
                return Err(AuditError::fetch(url, "HTTP 503"));
            }
            Ok(PageMetadata {
                title: Some(format!("page {}", url)),
                error: self.error_flag,
                ..Default::default()
            })
        }
    }

    struct CountingSource(AtomicUsize);

    #[async_trait]
    impl DocumentSource for CountingSource {
        async fn fetch_document(&self, _url: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("<html><body>letter</body></html>".into())
        }
    }

    #[test]
    fn sqlite_round_trip_and_expiry() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put("a", "1", Duration::from_secs(60));
        cache.put("b", "2", Duration::ZERO);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("missing"), None);

        assert_eq!(cache.stats().unwrap(), CacheStats { entries: 2, expired: 1 });
        assert_eq!(cache.prune_expired().unwrap(), 1);
        assert_eq!(cache.stats().unwrap(), CacheStats { entries: 1, expired: 0 });
        assert_eq!(cache.clear().unwrap(), 1);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn overflow_evicts_oldest_half() {
        let cache = SqliteCache::in_memory().unwrap().with_max_entries(4);
        for i in 0..5 {
            cache.put(&format!("k{}", i), "v", Duration::from_secs(60));
        }
        // 5 rows > 4: the two oldest go.
        assert_eq!(cache.stats().unwrap().entries, 3);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k1"), None);
        assert!(cache.get("k4").is_some());
    }

    #[test]
    fn sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache.sqlite");
        SqliteCache::open(&path)
            .unwrap()
            .put("k", "v", Duration::from_secs(60));
        let reopened = SqliteCache::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn memory_cache_expires() {
        let cache = MemoryCache::new();
        cache.put("x", "y", Duration::from_secs(60));
        cache.put("z", "w", Duration::ZERO);
        assert_eq!(cache.get("x").as_deref(), Some("y"));
        assert_eq!(cache.get("z"), None);
    }

    #[tokio::test]
    async fn metadata_cached_after_first_fetch() {
        let inner = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            error_flag: false,
        });
        let store = Arc::new(MemoryCache::new());
        let cached = CachedMetadataFetcher::new(inner.clone(), store.clone());

        let first = cached.fetch("https://a.example").await.unwrap();
        let second = cached.fetch("https://a.example").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert!(store.get("scrape_https://a.example").is_some());
    }

    #[tokio::test]
    async fn failures_and_error_pages_are_not_cached() {
        let inner = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            error_flag: true,
        });
        let cached = CachedMetadataFetcher::new(inner.clone(), Arc::new(MemoryCache::new()));

        assert!(cached.fetch("https://down.example").await.is_err());
        assert!(cached.fetch("https://down.example").await.is_err());
        cached.fetch("https://flaky.example").await.unwrap();
        cached.fetch("https://flaky.example").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn newsletter_markup_cached() {
        let inner = Arc::new(CountingSource(AtomicUsize::new(0)));
        let store = Arc::new(SqliteCache::in_memory().unwrap());
        let cached = CachedDocumentSource::new(inner.clone(), store.clone());

        cached.fetch_document("https://letter.example/1").await.unwrap();
        cached.fetch_document("https://letter.example/1").await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);
        assert!(store.get("newsletter_https://letter.example/1").is_some());
    }
}
