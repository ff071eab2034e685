//! In-memory asset store.
//!
//! A durable-store stand-in for tests and local wiring. Listing methods
//! return lazy cursors over a snapshot of matching ids; each cursor holds a
//! [`CursorGuard`] so callers can verify that every exit path releases it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use favorites_core::{Asset, AssetId, FavoritesError, FavoritesResult, StorageError};

use crate::ports::{boxed_stream, AssetStore, AssetStream};

/// Tracks a live store cursor; releases it on drop.
#[derive(Debug)]
pub struct CursorGuard {
    open: Arc<AtomicUsize>,
}

impl CursorGuard {
    pub fn open(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { open: counter }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct StoredAsset {
    asset: Asset,
    /// Insertion order; higher is more recent.
    seq: u64,
}

/// In-memory store ordered by insertion recency.
#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    assets: Arc<RwLock<HashMap<AssetId, StoredAsset>>>,
    next_seq: AtomicU64,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryAssetStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assets.
    pub fn len(&self) -> usize {
        self.assets.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cursors that have been opened and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Clear all stored data.
    pub fn clear(&self) -> FavoritesResult<()> {
        self.assets
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Ids matching `filter`, most recent first, paginated.
    fn page_ids<F>(&self, filter: F, limit: usize, offset: usize) -> FavoritesResult<Vec<AssetId>>
    where
        F: Fn(&Asset) -> bool,
    {
        let assets = self.assets.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut matching: Vec<(&AssetId, u64)> = assets
            .iter()
            .filter(|(_, stored)| filter(&stored.asset))
            .map(|(id, stored)| (id, stored.seq))
            .collect();
        matching.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    /// Lazily resolve `ids` one at a time as the consumer pulls.
    fn cursor(&self, ids: Vec<AssetId>) -> AssetStream {
        let assets = Arc::clone(&self.assets);
        let guard = CursorGuard::open(Arc::clone(&self.open_cursors));

        boxed_stream(async_stream::try_stream! {
            let _guard = guard;
            for id in ids {
                let found = lookup(&assets, &id)?;
                // Rows deleted after the cursor opened are skipped.
                if let Some(asset) = found {
                    yield asset;
                }
            }
        })
    }
}

fn lookup(
    assets: &RwLock<HashMap<AssetId, StoredAsset>>,
    id: &str,
) -> FavoritesResult<Option<Asset>> {
    let assets = assets.read().map_err(|_| StorageError::LockPoisoned)?;
    Ok(assets.get(id).map(|stored| stored.asset.clone()))
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn save(&self, asset: &Asset) -> FavoritesResult<()> {
        let mut assets = self.assets.write().map_err(|_| StorageError::LockPoisoned)?;
        if assets.contains_key(asset.id()) {
            return Err(StorageError::InsertFailed {
                id: asset.id().clone(),
                reason: "already exists".to_string(),
            }
            .into());
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        assets.insert(
            asset.id().clone(),
            StoredAsset {
                asset: asset.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> FavoritesResult<Asset> {
        let assets = self.assets.read().map_err(|_| StorageError::LockPoisoned)?;
        assets
            .get(id)
            .map(|stored| stored.asset.clone())
            .ok_or_else(|| FavoritesError::not_found(id))
    }

    async fn find_all(&self, limit: usize, offset: usize) -> FavoritesResult<AssetStream> {
        let ids = self.page_ids(|_| true, limit, offset)?;
        Ok(self.cursor(ids))
    }

    async fn find_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
    ) -> FavoritesResult<AssetStream> {
        let ids = self.page_ids(|asset| asset.owner_id() == owner_id, limit, offset)?;
        Ok(self.cursor(ids))
    }

    async fn delete(&self, id: &str) -> FavoritesResult<()> {
        let mut assets = self.assets.write().map_err(|_| StorageError::LockPoisoned)?;
        match assets.remove(id) {
            Some(_) => Ok(()),
            None => Err(FavoritesError::not_found(id)),
        }
    }

    async fn update_description(&self, id: &str, description: &str) -> FavoritesResult<Asset> {
        let mut assets = self.assets.write().map_err(|_| StorageError::LockPoisoned)?;
        let stored = assets
            .get_mut(id)
            .ok_or_else(|| FavoritesError::not_found(id))?;
        stored.asset = stored.asset.clone().with_description(description);
        Ok(stored.asset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use favorites_core::{Chart, Insight};
    use futures_util::StreamExt;

    fn insight(id: &str, owner: &str) -> Asset {
        Insight::new(id, owner, format!("Insight {id}"), "content").into()
    }

    async fn collect_ids(stream: AssetStream) -> Vec<AssetId> {
        stream
            .map(|item| item.expect("cursor item should be Ok").id().clone())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = InMemoryAssetStore::new();
        let asset = insight("1", "u1");
        store.save(&asset).await.expect("save should succeed");

        let found = store.find_by_id("1").await.expect("find should succeed");
        assert_eq!(found, asset);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_save_fails() {
        let store = InMemoryAssetStore::new();
        let asset = insight("1", "u1");
        store.save(&asset).await.expect("save should succeed");

        match store.save(&asset).await {
            Err(FavoritesError::Storage(StorageError::InsertFailed { id, .. })) => {
                assert_eq!(id, "1")
            }
            other => panic!("Expected InsertFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let store = InMemoryAssetStore::new();
        assert!(store.find_by_id("nope").await.unwrap_err().is_not_found());
        assert!(store.delete("nope").await.unwrap_err().is_not_found());
        assert!(store
            .update_description("nope", "d")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_find_all_is_most_recent_first_and_paginated() {
        let store = InMemoryAssetStore::new();
        for id in ["a", "b", "c", "d"] {
            store.save(&insight(id, "u1")).await.unwrap();
        }

        let all = collect_ids(store.find_all(10, 0).await.unwrap()).await;
        assert_eq!(all, vec!["d", "c", "b", "a"]);

        let page = collect_ids(store.find_all(2, 1).await.unwrap()).await;
        assert_eq!(page, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_owner_filters() {
        let store = InMemoryAssetStore::new();
        store.save(&insight("1", "alice")).await.unwrap();
        store.save(&insight("2", "bob")).await.unwrap();
        store
            .save(&Chart::new("3", "alice", "c").with_axes(Some("x".into()), None).into())
            .await
            .unwrap();

        let alice = collect_ids(store.find_by_owner("alice", 10, 0).await.unwrap()).await;
        assert_eq!(alice, vec!["3", "1"]);
    }

    #[tokio::test]
    async fn test_cursor_released_on_exhaustion_and_drop() {
        let store = InMemoryAssetStore::new();
        for id in ["a", "b", "c"] {
            store.save(&insight(id, "u1")).await.unwrap();
        }

        let stream = store.find_all(10, 0).await.unwrap();
        assert_eq!(store.open_cursors(), 1);
        let _ = collect_ids(stream).await;
        assert_eq!(store.open_cursors(), 0);

        let mut stream = store.find_all(10, 0).await.unwrap();
        let first = stream.next().await.expect("one item").expect("Ok item");
        assert_eq!(first.id(), "c");
        assert_eq!(store.open_cursors(), 1);
        drop(stream);
        assert_eq!(store.open_cursors(), 0);

        // Never polled at all.
        let stream = store.find_all(10, 0).await.unwrap();
        drop(stream);
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_update_description_replaces_record() {
        let store = InMemoryAssetStore::new();
        store.save(&insight("1", "u1")).await.unwrap();

        let updated = store.update_description("1", "new desc").await.unwrap();
        assert_eq!(updated.description(), Some("new desc"));
        let reloaded = store.find_by_id("1").await.unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let store = InMemoryAssetStore::new();
        store.save(&insight("1", "u1")).await.unwrap();
        store.delete("1").await.unwrap();
        assert!(store.is_empty());
    }
}
