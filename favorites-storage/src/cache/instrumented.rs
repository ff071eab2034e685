//! Hit/miss accounting around any [`AssetCache`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use favorites_core::{AssetId, FavoritesResult, Score};

use crate::ports::AssetCache;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Ids returned by `get_batch`.
    pub hits: u64,
    /// Ids requested from `get_batch` but not returned.
    pub misses: u64,
    /// Blobs written through this wrapper and not yet removed.
    pub entry_count: u64,
    /// Payload bytes of those blobs.
    pub memory_bytes: u64,
    /// Blobs dropped by `remove` or `invalidate`.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    stats: CacheStats,
    /// Payload size per live blob.
    sizes: HashMap<AssetId, u64>,
}

impl StatsInner {
    fn record_write(&mut self, id: &str, size: u64) {
        match self.sizes.insert(id.to_string(), size) {
            Some(old) => {
                self.stats.memory_bytes = self.stats.memory_bytes.saturating_sub(old) + size;
            }
            None => {
                self.stats.entry_count += 1;
                self.stats.memory_bytes += size;
            }
        }
    }

    fn record_drop(&mut self, id: &str) {
        if let Some(size) = self.sizes.remove(id) {
            self.stats.entry_count = self.stats.entry_count.saturating_sub(1);
            self.stats.memory_bytes = self.stats.memory_bytes.saturating_sub(size);
            self.stats.evictions += 1;
        }
    }
}

/// Decorator that counts batch hits and misses on the wrapped cache.
///
/// Failed operations are forwarded unchanged and leave the counters alone.
#[derive(Debug)]
pub struct InstrumentedCache<C> {
    inner: Arc<C>,
    stats: RwLock<StatsInner>,
}

impl<C: AssetCache> InstrumentedCache<C> {
    pub fn new(inner: Arc<C>) -> Self {
        Self {
            inner,
            stats: RwLock::new(StatsInner::default()),
        }
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Snapshot of the current counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .read()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut s) = self.stats.write() {
            *s = StatsInner::default();
        }
    }

    fn update(&self, f: impl FnOnce(&mut StatsInner)) {
        if let Ok(mut s) = self.stats.write() {
            f(&mut s);
        }
    }
}

#[async_trait]
impl<C: AssetCache> AssetCache for InstrumentedCache<C> {
    async fn add_to_index(&self, id: &str, score: Score) -> FavoritesResult<()> {
        self.inner.add_to_index(id, score).await
    }

    async fn set_blob(&self, id: &str, bytes: Vec<u8>) -> FavoritesResult<()> {
        let size = bytes.len() as u64;
        self.inner.set_blob(id, bytes).await?;
        self.update(|s| s.record_write(id, size));
        Ok(())
    }

    async fn get_batch(&self, ids: &[AssetId]) -> FavoritesResult<HashMap<AssetId, Vec<u8>>> {
        let found = self.inner.get_batch(ids).await?;
        let hits = found.len() as u64;
        let misses = (ids.len() as u64).saturating_sub(hits);
        self.update(|s| {
            s.stats.hits += hits;
            s.stats.misses += misses;
        });
        if misses > 0 {
            tracing::trace!(hits, misses, "Cache batch partially missed");
        }
        Ok(found)
    }

    async fn get_index_range(&self, start: i64, stop: i64) -> FavoritesResult<Vec<AssetId>> {
        self.inner.get_index_range(start, stop).await
    }

    async fn remove(&self, id: &str) -> FavoritesResult<()> {
        self.inner.remove(id).await?;
        self.update(|s| s.record_drop(id));
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> FavoritesResult<()> {
        self.inner.invalidate(id).await?;
        self.update(|s| s.record_drop(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryAssetCache;

    fn instrumented() -> InstrumentedCache<InMemoryAssetCache> {
        InstrumentedCache::new(Arc::new(InMemoryAssetCache::new()))
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_counts_batch_hits_and_misses() {
        let cache = instrumented();
        cache.set_blob("a", b"AAAA".to_vec()).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = cache.get_batch(&ids).await.unwrap();
        assert_eq!(found.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_bytes, 4);
    }

    #[tokio::test]
    async fn test_overwrite_and_evict_track_entries() {
        let cache = instrumented();
        cache.set_blob("a", vec![0; 10]).await.unwrap();
        cache.set_blob("a", vec![0; 4]).await.unwrap();
        cache.set_blob("b", vec![0; 6]).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.memory_bytes, 10);

        cache.invalidate("a").await.unwrap();
        cache.remove("b").await.unwrap();
        cache.remove("never-written").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.memory_bytes, 0);
        assert_eq!(stats.evictions, 2);

        cache.reset_stats();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_index_calls_pass_through() {
        let cache = instrumented();
        cache.add_to_index("a", 1.0).await.unwrap();
        assert!(cache.inner().is_indexed("a"));
        assert_eq!(cache.get_index_range(0, -1).await.unwrap(), vec!["a"]);
    }
}
