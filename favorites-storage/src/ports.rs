//! Port traits consumed by the orchestration service.
//!
//! The durable store, the read cache and the enricher are external
//! collaborators. This module fixes the contracts the service relies on;
//! concrete adapters live in [`crate::memory`] and [`crate::cache`].

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use favorites_core::{Asset, AssetId, FavoritesResult, Score};
use futures_util::Stream;

/// Lazy, pull-based sequence of assets.
///
/// `Some(Ok(_))` is an item, `Some(Err(_))` is terminal, `None` is the end.
/// Dropping the stream before exhaustion must release whatever cursor
/// backs it.
pub type AssetStream = Pin<Box<dyn Stream<Item = FavoritesResult<Asset>> + Send>>;

/// Box a concrete asset stream, fixing its error type to [`FavoritesError`].
///
/// [`FavoritesError`]: favorites_core::FavoritesError
pub fn boxed_stream<S>(stream: S) -> AssetStream
where
    S: Stream<Item = FavoritesResult<Asset>> + Send + 'static,
{
    Box::pin(stream)
}

/// Durable repository of assets. Source of truth.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist a new asset.
    async fn save(&self, asset: &Asset) -> FavoritesResult<()>;

    /// Fetch an asset by id, failing with `NotFound` when absent.
    async fn find_by_id(&self, id: &str) -> FavoritesResult<Asset>;

    /// Stream assets most-recent-first, skipping `offset` and yielding at most `limit`.
    async fn find_all(&self, limit: usize, offset: usize) -> FavoritesResult<AssetStream>;

    /// Stream the assets owned by `owner_id`, most-recent-first.
    async fn find_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
    ) -> FavoritesResult<AssetStream>;

    /// Delete an asset, failing with `NotFound` when no row was affected.
    async fn delete(&self, id: &str) -> FavoritesResult<()>;

    /// Replace the description of an asset and return the updated record.
    async fn update_description(&self, id: &str, description: &str) -> FavoritesResult<Asset>;
}

/// Sorted-index plus blob-store cache.
///
/// The index (id → recency score) and the blobs (id → encoded asset) are
/// independently writable, so an id may be indexed without a blob.
#[async_trait]
pub trait AssetCache: Send + Sync {
    /// Upsert `id` into the ordered index with `score`.
    async fn add_to_index(&self, id: &str, score: Score) -> FavoritesResult<()>;

    /// Upsert the encoded payload for `id`.
    async fn set_blob(&self, id: &str, bytes: Vec<u8>) -> FavoritesResult<()>;

    /// Fetch the blobs for `ids`. Missing ids are absent from the map.
    async fn get_batch(&self, ids: &[AssetId]) -> FavoritesResult<HashMap<AssetId, Vec<u8>>>;

    /// Ids at 0-based positions `start..=stop` of the index, highest score
    /// first. Negative bounds count from the end; `-1` is the last entry.
    async fn get_index_range(&self, start: i64, stop: i64) -> FavoritesResult<Vec<AssetId>>;

    /// Remove both the index entry and the blob for `id`.
    async fn remove(&self, id: &str) -> FavoritesResult<()>;

    /// Remove only the blob for `id`, keeping index membership.
    async fn invalidate(&self, id: &str) -> FavoritesResult<()>;
}

/// External hydration step applied before an asset is cached.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Return an enriched copy of `asset`.
    async fn enrich(&self, asset: Asset) -> FavoritesResult<Asset>;
}

/// Enricher that returns assets unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(&self, asset: Asset) -> FavoritesResult<Asset> {
        Ok(asset)
    }
}

/// Resolve an index range request against an index of `len` entries.
///
/// Returns the half-open slice `[from, to)` or `None` when the range is
/// empty, using the same clamping rules as a Redis `ZREVRANGE`.
pub fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize + 1))
}
