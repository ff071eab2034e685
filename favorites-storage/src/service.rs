//! Cache-consistent orchestration over the store, cache and enricher ports.
//!
//! Writes always land in the store first; enrichment and cache population
//! run inline afterwards and never fail the call. Reads consult the cache,
//! fall back to the store, and repair the cache on the way out.

use std::sync::Arc;

use async_stream::try_stream;
use favorites_core::{
    score_now, Asset, AssetId, FavoritesError, FavoritesResult, OwnerId, ServiceConfig,
};
use futures_util::StreamExt;
use tracing::instrument;

use crate::ports::{boxed_stream, AssetCache, AssetStore, AssetStream, Enricher};

/// Enrich-then-cache step shared by every read and write path.
struct WriteThrough<C, E> {
    cache: Arc<C>,
    enricher: Arc<E>,
}

impl<C, E> Clone for WriteThrough<C, E> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            enricher: Arc::clone(&self.enricher),
        }
    }
}

impl<C: AssetCache, E: Enricher> WriteThrough<C, E> {
    /// Enrich `asset` and write the result through to the cache.
    ///
    /// Returns the enriched asset, or the input unchanged when enrichment
    /// fails. Cache failures are logged only.
    async fn enrich_and_cache(&self, asset: Asset) -> Asset {
        let enriched = match self.enricher.enrich(asset.clone()).await {
            Ok(enriched) => enriched,
            Err(e) => {
                tracing::warn!(
                    asset_id = %asset.id(),
                    error = %e,
                    "Enrichment failed, caching unenriched asset"
                );
                asset
            }
        };
        self.update_cache(&enriched).await;
        enriched
    }

    async fn update_cache(&self, asset: &Asset) {
        let bytes = match asset.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    asset_id = %asset.id(),
                    error = %e,
                    "Failed to encode asset for cache"
                );
                return;
            }
        };

        let id = asset.id();
        if let Err(e) = self.cache.add_to_index(id, score_now()).await {
            tracing::error!(asset_id = %id, error = %e, "Failed to update cache index");
        }
        if let Err(e) = self.cache.set_blob(id, bytes).await {
            tracing::error!(asset_id = %id, error = %e, "Failed to set cache blob");
        }
    }
}

/// Read-through, write-through favorites service.
///
/// Generic over its three collaborators so tests can observe every port
/// call. Streams returned by [`FavoriteService::find_all`] own clones of the
/// collaborator handles and outlive the borrow of `self`.
pub struct FavoriteService<S, C, E> {
    store: Arc<S>,
    write_through: WriteThrough<C, E>,
    config: ServiceConfig,
}

impl<S, C, E> Clone for FavoriteService<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            write_through: self.write_through.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, C, E> FavoriteService<S, C, E>
where
    S: AssetStore + 'static,
    C: AssetCache + 'static,
    E: Enricher + 'static,
{
    /// Create a service with the default [`ServiceConfig`].
    pub fn new(store: Arc<S>, cache: Arc<C>, enricher: Arc<E>) -> Self {
        Self {
            store,
            write_through: WriteThrough { cache, enricher },
            config: ServiceConfig::default(),
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: ServiceConfig) -> FavoritesResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.write_through.cache
    }

    pub fn enricher(&self) -> &E {
        &self.write_through.enricher
    }

    /// Validate and persist `asset`, then populate the cache.
    ///
    /// # Errors
    ///
    /// - [`FavoritesError::Validation`] when the asset breaks its variant rules
    /// - [`FavoritesError::Persistence`] when the store rejects the write
    ///
    /// Enrichment and cache failures are logged and never returned.
    #[instrument(
        name = "favorites.save",
        skip_all,
        fields(asset_id = %asset.id(), kind = %asset.kind())
    )]
    pub async fn save(&self, asset: &Asset) -> FavoritesResult<()> {
        tracing::info!("Saving asset");
        asset.validate()?;

        self.store
            .save(asset)
            .await
            .map_err(|e| e.into_persistence(asset.id()))?;

        self.write_through.enrich_and_cache(asset.clone()).await;
        Ok(())
    }

    /// Fetch a single asset, serving from the cache when its blob is present.
    ///
    /// A cache hit touches neither the store nor the enricher. On a miss the
    /// store copy is enriched and written back before it is returned.
    #[instrument(name = "favorites.find_by_id", skip(self))]
    pub async fn find_by_id(&self, id: &str) -> FavoritesResult<Asset> {
        match self.cache().get_batch(&[id.to_string()]).await {
            Ok(mut found) => {
                if let Some(bytes) = found.remove(id) {
                    tracing::debug!("Cache hit");
                    return Asset::decode(&bytes);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache lookup failed, reading from store");
            }
        }

        let asset = self.store.find_by_id(id).await?;
        Ok(self.write_through.enrich_and_cache(asset).await)
    }

    /// Stream at most `limit` assets starting at `offset`, most recent first.
    ///
    /// When the cache index covers the page, blobs are fetched in batches of
    /// `config.batch_size` and missing ones are repaired from the store one
    /// id at a time. Otherwise the store is streamed and every item is
    /// enriched and cached before it is yielded.
    ///
    /// Errors opening the store cursor are returned here; errors after that
    /// end the stream as its last item.
    #[instrument(name = "favorites.find_all", skip(self))]
    pub async fn find_all(&self, limit: usize, offset: usize) -> FavoritesResult<AssetStream> {
        if limit == 0 {
            return Ok(boxed_stream(futures_util::stream::empty()));
        }

        let start = i64::try_from(offset).unwrap_or(i64::MAX);
        let stop = start.saturating_add(i64::try_from(limit).unwrap_or(i64::MAX) - 1);

        match self.cache().get_index_range(start, stop).await {
            Ok(ids) if !ids.is_empty() => {
                tracing::info!(count = ids.len(), "Cache hit for favorites page");
                return Ok(self.chunked_cache_stream(ids));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Cache index read failed, streaming from store");
            }
        }

        tracing::info!("Streaming favorites from store");
        let rows = self.store.find_all(limit, offset).await?;
        Ok(self.write_through_stream(rows))
    }

    /// Stream the assets owned by `owner_id` straight from the store.
    #[instrument(name = "favorites.find_all_by_owner", skip(self))]
    pub async fn find_all_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
    ) -> FavoritesResult<AssetStream> {
        self.store.find_by_owner(owner_id, limit, offset).await
    }

    /// Delete an asset owned by `owner_id`, then drop it from the cache.
    ///
    /// A store failure is returned as [`FavoritesError::Persistence`] and
    /// leaves the cache untouched.
    #[instrument(name = "favorites.delete", skip(self))]
    pub async fn delete(&self, id: &str, owner_id: &str) -> FavoritesResult<()> {
        self.authorize(id, owner_id).await?;
        self.store
            .delete(id)
            .await
            .map_err(|e| e.into_delete_failure(id))?;
        self.evict(id).await;
        Ok(())
    }

    /// Replace the description of an asset owned by `owner_id`.
    ///
    /// The cache entry is removed rather than refreshed; the next read
    /// reloads and re-enriches from the store.
    #[instrument(name = "favorites.update_description", skip(self, description))]
    pub async fn update_description(
        &self,
        id: &str,
        description: &str,
        owner_id: &str,
    ) -> FavoritesResult<Asset> {
        self.authorize(id, owner_id).await?;
        let updated = self
            .store
            .update_description(id, description)
            .await
            .map_err(|e| e.into_update_failure(id))?;
        self.evict(id).await;
        Ok(updated)
    }

    /// Check ownership against the store copy, never the cache.
    async fn authorize(&self, id: &str, owner_id: &str) -> FavoritesResult<()> {
        let current = self.store.find_by_id(id).await?;
        if current.owner_id() != owner_id {
            tracing::warn!(owner_id = %owner_id, "Ownership check failed");
            return Err(FavoritesError::Forbidden {
                id: id.to_string(),
                owner_id: OwnerId::from(owner_id),
            });
        }
        Ok(())
    }

    async fn evict(&self, id: &str) {
        if let Err(e) = self.cache().remove(id).await {
            tracing::error!(asset_id = %id, error = %e, "Failed to remove asset from cache");
        }
    }

    /// Resolve cached ids batch by batch, repairing ids whose blob is gone.
    fn chunked_cache_stream(&self, ids: Vec<AssetId>) -> AssetStream {
        let store = Arc::clone(&self.store);
        let write_through = self.write_through.clone();
        let batch_size = self.config.batch_size.max(1);

        boxed_stream(try_stream! {
            for chunk in ids.chunks(batch_size) {
                let mut blobs = write_through.cache.get_batch(chunk).await?;
                for id in chunk {
                    let asset = match blobs.remove(id) {
                        Some(bytes) => Asset::decode(&bytes)?,
                        None => {
                            tracing::warn!(
                                asset_id = %id,
                                "Cache inconsistency detected (missing blob), repairing from store"
                            );
                            let asset = store.find_by_id(id).await?;
                            write_through.enrich_and_cache(asset).await
                        }
                    };
                    yield asset;
                }
            }
        })
    }

    /// Enrich and cache each store row before handing it to the consumer.
    fn write_through_stream(&self, mut rows: AssetStream) -> AssetStream {
        let write_through = self.write_through.clone();

        boxed_stream(try_stream! {
            while let Some(row) = rows.next().await {
                let asset = row?;
                yield write_through.enrich_and_cache(asset).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryAssetCache;
    use crate::memory::InMemoryAssetStore;
    use crate::ports::NoopEnricher;
    use favorites_core::{Chart, Insight, ValidationError};
    use futures_util::TryStreamExt;

    type Service = FavoriteService<InMemoryAssetStore, InMemoryAssetCache, NoopEnricher>;

    fn service() -> Service {
        FavoriteService::new(
            Arc::new(InMemoryAssetStore::new()),
            Arc::new(InMemoryAssetCache::new()),
            Arc::new(NoopEnricher),
        )
    }

    fn insight(id: &str, owner: &str) -> Asset {
        Insight::new(id, owner, "Test", "Knowledge").into()
    }

    #[tokio::test]
    async fn test_save_populates_store_and_cache() {
        let svc = service();
        svc.save(&insight("1", "u1")).await.expect("save should succeed");

        assert_eq!(svc.store().len(), 1);
        assert!(svc.cache().is_indexed("1"));
        assert!(svc.cache().has_blob("1"));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_asset() {
        let svc = service();
        let chart: Asset = Chart::new("c1", "u1", "No axes").into();

        match svc.save(&chart).await {
            Err(FavoritesError::Validation(ValidationError::ConstraintViolation { .. })) => {}
            other => panic!("Expected constraint violation, got: {:?}", other),
        }
        assert!(svc.store().is_empty());
        assert_eq!(svc.cache().index_len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_save_is_persistence_error() {
        let svc = service();
        svc.save(&insight("1", "u1")).await.unwrap();
        let err = svc.save(&insight("1", "u1")).await.unwrap_err();
        assert!(matches!(err, FavoritesError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_find_by_id_round_trip() {
        let svc = service();
        let asset = insight("1", "u1");
        svc.save(&asset).await.unwrap();

        assert_eq!(svc.find_by_id("1").await.unwrap(), asset);

        svc.cache().drop_blob("1");
        assert_eq!(svc.find_by_id("1").await.unwrap(), asset);
        assert!(svc.cache().has_blob("1"));
    }

    #[tokio::test]
    async fn test_find_all_prefers_cache_then_store() {
        let svc = service();
        for id in ["a", "b", "c"] {
            svc.save(&insight(id, "u1")).await.unwrap();
        }

        let page: Vec<Asset> = svc.find_all(2, 0).await.unwrap().try_collect().await.unwrap();
        assert_eq!(page.len(), 2);

        let empty = service();
        let page: Vec<Asset> = empty.find_all(10, 0).await.unwrap().try_collect().await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_yields_nothing() {
        let svc = service();
        svc.save(&insight("1", "u1")).await.unwrap();
        let page: Vec<Asset> = svc.find_all(0, 0).await.unwrap().try_collect().await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let svc = service();
        svc.save(&insight("1", "alice")).await.unwrap();

        assert!(svc.delete("1", "mallory").await.unwrap_err().is_forbidden());
        assert_eq!(svc.store().len(), 1);

        svc.delete("1", "alice").await.unwrap();
        assert!(svc.store().is_empty());
        assert!(!svc.cache().is_indexed("1"));
    }

    #[tokio::test]
    async fn test_update_description_invalidates_cache() {
        let svc = service();
        svc.save(&insight("1", "alice")).await.unwrap();

        let updated = svc.update_description("1", "fresh", "alice").await.unwrap();
        assert_eq!(updated.description(), Some("fresh"));
        assert!(!svc.cache().has_blob("1"));

        let reloaded = svc.find_by_id("1").await.unwrap();
        assert_eq!(reloaded.description(), Some("fresh"));
    }

    #[test]
    fn test_with_config_rejects_zero_batch() {
        let result = service().with_config(ServiceConfig::new().with_batch_size(0));
        assert!(matches!(result, Err(FavoritesError::Config(_))));
    }
}
