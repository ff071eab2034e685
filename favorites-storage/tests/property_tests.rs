//! Property tests for the orchestration service.

use favorites_core::Asset;
use favorites_test_utils::generators::{arb_asset, arb_assets};
use favorites_test_utils::Harness;
use futures_util::TryStreamExt;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Save then FindByID returns the same asset through both read paths.
    #[test]
    fn prop_save_then_find_round_trips(asset in arb_asset()) {
        let (cached, repaired) = runtime().block_on(async {
            let h = Harness::empty();
            h.service.save(&asset).await.unwrap();
            let cached = h.service.find_by_id(asset.id()).await.unwrap();
            h.cache.inner().drop_blob(asset.id());
            let repaired = h.service.find_by_id(asset.id()).await.unwrap();
            (cached, repaired)
        });
        prop_assert_eq!(&cached, &asset);
        prop_assert_eq!(&repaired, &asset);
    }

    /// A full listing returns every saved asset exactly once, with one store
    /// read per evicted blob and none for the rest.
    #[test]
    fn prop_listing_is_complete_under_eviction(
        assets in arb_assets(12),
        evict_every in 1usize..4,
    ) {
        let (listed, store_reads) = runtime().block_on(async {
            let h = Harness::empty();
            for asset in &assets {
                h.service.save(asset).await.unwrap();
            }
            for asset in assets.iter().step_by(evict_every) {
                h.cache.inner().drop_blob(asset.id());
            }
            let before = h.store.calls().find_by_id;
            let listed: Vec<Asset> = h
                .service
                .find_all(assets.len().max(1), 0)
                .await
                .unwrap()
                .try_collect()
                .await
                .unwrap();
            (listed, h.store.calls().find_by_id - before)
        });

        let evicted = assets.iter().step_by(evict_every).count();
        let mut listed_ids: Vec<_> = listed.iter().map(|a| a.id().clone()).collect();
        let mut saved_ids: Vec<_> = assets.iter().map(|a| a.id().clone()).collect();
        listed_ids.sort();
        saved_ids.sort();
        prop_assert_eq!(listed_ids, saved_ids);
        prop_assert_eq!(store_reads, evicted);
    }
}
