//! In-memory cache with independently writable index and blobs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use favorites_core::{AssetId, CacheError, FavoritesResult, Score};

use crate::ports::{resolve_range, AssetCache};

#[derive(Debug, Default)]
struct Inner {
    index: HashMap<AssetId, Score>,
    blobs: HashMap<AssetId, Vec<u8>>,
}

/// Process-local [`AssetCache`].
///
/// The index and the blob map drift the same way a networked cache does:
/// [`InMemoryAssetCache::drop_blob`] simulates an eviction that leaves the
/// index entry behind.
#[derive(Debug, Default)]
pub struct InMemoryAssetCache {
    inner: RwLock<Inner>,
}

impl InMemoryAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, CacheError> {
        self.inner.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, CacheError> {
        self.inner.write().map_err(|_| CacheError::LockPoisoned)
    }

    /// Whether `id` is a member of the ordered index.
    pub fn is_indexed(&self, id: &str) -> bool {
        self.read().map(|i| i.index.contains_key(id)).unwrap_or(false)
    }

    /// Whether a blob is stored for `id`.
    pub fn has_blob(&self, id: &str) -> bool {
        self.read().map(|i| i.blobs.contains_key(id)).unwrap_or(false)
    }

    /// Score currently recorded for `id`.
    pub fn score(&self, id: &str) -> Option<Score> {
        self.read().ok().and_then(|i| i.index.get(id).copied())
    }

    /// Number of index entries.
    pub fn index_len(&self) -> usize {
        self.read().map(|i| i.index.len()).unwrap_or(0)
    }

    /// Drop the blob for `id` while keeping its index entry.
    pub fn drop_blob(&self, id: &str) {
        if let Ok(mut inner) = self.write() {
            inner.blobs.remove(id);
        }
    }

    /// Ids ordered by score descending, ties broken by id descending.
    fn ordered_ids(inner: &Inner) -> Vec<AssetId> {
        let mut entries: Vec<(&AssetId, Score)> =
            inner.index.iter().map(|(id, score)| (id, *score)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl AssetCache for InMemoryAssetCache {
    async fn add_to_index(&self, id: &str, score: Score) -> FavoritesResult<()> {
        self.write()?.index.insert(id.to_string(), score);
        Ok(())
    }

    async fn set_blob(&self, id: &str, bytes: Vec<u8>) -> FavoritesResult<()> {
        self.write()?.blobs.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn get_batch(&self, ids: &[AssetId]) -> FavoritesResult<HashMap<AssetId, Vec<u8>>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.blobs.get(id).map(|b| (id.clone(), b.clone())))
            .collect())
    }

    async fn get_index_range(&self, start: i64, stop: i64) -> FavoritesResult<Vec<AssetId>> {
        let inner = self.read()?;
        let ordered = Self::ordered_ids(&inner);
        Ok(match resolve_range(ordered.len(), start, stop) {
            Some((from, to)) => ordered[from..to].to_vec(),
            None => Vec::new(),
        })
    }

    async fn remove(&self, id: &str) -> FavoritesResult<()> {
        let mut inner = self.write()?;
        inner.index.remove(id);
        inner.blobs.remove(id);
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> FavoritesResult<()> {
        self.write()?.blobs.remove(id);
        Ok(())
    }
}
