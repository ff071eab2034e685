//! Favorites Storage - Ports, Adapters and Orchestration
//!
//! Defines the store, cache and enricher ports, the in-memory and LMDB
//! adapters behind them, and [`FavoriteService`], which keeps the cache
//! consistent with the store through write-through and read-repair.

pub mod cache;
pub mod memory;
pub mod ports;
pub mod service;

pub use cache::{
    CacheStats, InMemoryAssetCache, InstrumentedCache, LmdbAssetCache, LmdbCacheConfig,
    LmdbCacheError, ScoreKey,
};
pub use memory::{CursorGuard, InMemoryAssetStore};
pub use ports::{
    boxed_stream, resolve_range, AssetCache, AssetStore, AssetStream, Enricher, NoopEnricher,
};
pub use service::FavoriteService;

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use favorites_core::{Asset, Insight};
    use futures_util::TryStreamExt;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Index ranges never exceed the index or the requested window.
        #[test]
        fn prop_resolve_range_within_bounds(len in 0usize..50, start in -60i64..60, stop in -60i64..60) {
            if let Some((from, to)) = resolve_range(len, start, stop) {
                prop_assert!(from < to);
                prop_assert!(to <= len);
                if start >= 0 && stop >= 0 {
                    prop_assert!(to - from <= (stop - start + 1) as usize);
                }
            }
        }

        /// Any page of a cache-backed listing matches the same page of the
        /// store listing, whatever blobs have been evicted.
        #[test]
        fn prop_cached_page_matches_store_page(
            count in 1usize..20,
            limit in 1usize..10,
            offset in 0usize..20,
            evicted in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let rt = runtime();
            let (from_cache, from_store) = rt.block_on(async {
                let svc = FavoriteService::new(
                    Arc::new(InMemoryAssetStore::new()),
                    Arc::new(InMemoryAssetCache::new()),
                    Arc::new(NoopEnricher),
                );
                for i in 0..count {
                    let asset: Asset = Insight::new(format!("{i:03}"), "u", "n", "c").into();
                    svc.save(&asset).await.unwrap();
                    // Distinct scores regardless of clock resolution.
                    svc.cache().add_to_index(asset.id(), i as f64).await.unwrap();
                }
                for (i, gone) in evicted.iter().take(count).enumerate() {
                    if *gone {
                        svc.cache().drop_blob(&format!("{i:03}"));
                    }
                }

                let from_cache: Vec<Asset> =
                    svc.find_all(limit, offset).await.unwrap().try_collect().await.unwrap();
                let from_store: Vec<Asset> =
                    svc.store().find_all(limit, offset).await.unwrap().try_collect().await.unwrap();
                (from_cache, from_store)
            });
            prop_assert_eq!(from_cache, from_store);
        }
    }
}
