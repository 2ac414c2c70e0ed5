//! End-to-end sync scenarios against the in-memory fake catalog.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use storefront::api::{
    ChangeListEntry, ChangeListVersions, EntityType, SearchContents, ShopItemQuery,
};
use storefront::testing::{network_category, network_shop_item, FailurePoint, FakeCatalogSource};
use storefront::Storefront;

async fn storefront_with(source: &Arc<FakeCatalogSource>) -> Storefront {
    Storefront::in_memory(source.clone()).await.unwrap()
}

#[tokio::test]
async fn category_after_watermark_lands_and_advances_cursor() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;
    storefront
        .tracker()
        .update_change_list_versions(|_| ChangeListVersions {
            category_version: 5,
            shop_item_version: 9,
        })
        .await
        .unwrap();
    source.put_category_payload(network_category(42, "Tools"));
    source.push_change_list_entry(EntityType::Category, ChangeListEntry::upsert(42, 6));

    assert!(storefront.sync_and_index().await);

    let category = storefront.store().get_category(42).await.unwrap().unwrap();
    assert_eq!(category.name, "Tools");
    let versions = storefront.tracker().get_change_list_versions().await.unwrap();
    assert_eq!(versions.category_version, 6);
    assert_eq!(versions.shop_item_version, 9);
}

#[tokio::test]
async fn deleted_bookmarked_item_leaves_bookmark_feed() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;
    source.upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1]));
    source.upsert_shop_item(network_shop_item(8, "Rake", 2, vec![1]));
    assert!(storefront.sync_and_index().await);
    storefront.tracker().set_item_bookmarked(7, true).await;

    source.delete_shop_item(7);
    assert!(storefront.sync_and_index().await);

    assert!(storefront
        .store()
        .get_populated_shop_items_by_ids(&[7])
        .await
        .unwrap()
        .is_empty());
    let mut bookmarked = storefront.use_cases().observe_bookmarked();
    let items = timeout(Duration::from_secs(2), bookmarked.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(items.is_empty());
    assert!(storefront.tracker().current_user_data().is_bookmarked(7));
}

#[tokio::test]
async fn failed_item_sync_only_refetches_items_next_time() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;
    source.upsert_category(network_category(1, "Tools"));
    source.upsert_category(network_category(2, "Garden"));
    source.upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1]));
    source.fail(FailurePoint::ChangeList(EntityType::ShopItem));

    assert!(!storefront.sync_and_index().await);

    let versions = storefront.tracker().get_change_list_versions().await.unwrap();
    assert_eq!(versions.category_version, 2);
    assert_eq!(versions.shop_item_version, 0);
    // The index is only built after a fully successful sync
    assert!(!storefront.store().is_search_index_ready().await.unwrap());

    source.heal(FailurePoint::ChangeList(EntityType::ShopItem));
    source.clear_requests();
    assert!(storefront.sync_and_index().await);

    let mut requests = source.change_list_requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            (EntityType::Category, Some(2)),
            (EntityType::ShopItem, Some(0)),
        ]
    );
    assert_eq!(
        source.payload_requests(),
        vec![(EntityType::ShopItem, vec![7])]
    );
}

#[tokio::test]
async fn index_matches_relational_counts_after_every_sync() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;

    for round in 0..3i64 {
        source.upsert_category(network_category(round + 1, &format!("Category {}", round)));
        source.upsert_shop_item(network_shop_item(
            100 + round,
            &format!("Item {}", round),
            1 + round as u32,
            vec![round + 1, 50],
        ));
        if round == 2 {
            source.delete_shop_item(100);
            source.delete_category(50);
        }

        assert!(storefront.sync_and_index().await);

        let counts = storefront.store().get_fts_counts().await.unwrap();
        assert_eq!(counts.categories, storefront.store().count_categories().await.unwrap());
        assert_eq!(counts.shop_items, storefront.store().count_shop_items().await.unwrap());
        assert_eq!(storefront.store().count_dangling_associations().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn replaying_same_feed_from_scratch_converges() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;
    source.upsert_category(network_category(1, "Tools"));
    source.upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1, 2]));
    source.delete_category(3);
    assert!(storefront.sync_and_index().await);
    let before = storefront
        .store()
        .get_populated_shop_items(&ShopItemQuery::all())
        .await
        .unwrap();

    let replay = storefront_with(&source).await;
    assert!(replay.sync_and_index().await);
    assert!(replay.sync_and_index().await);

    let after = replay
        .store()
        .get_populated_shop_items(&ShopItemQuery::all())
        .await
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(
        replay.store().count_categories().await.unwrap(),
        storefront.store().count_categories().await.unwrap()
    );
}

#[tokio::test]
async fn search_is_not_ready_before_first_successful_sync() {
    let source = Arc::new(FakeCatalogSource::new());
    let storefront = storefront_with(&source).await;
    source.upsert_shop_item(network_shop_item(7, "Cordless drill", 1, vec![]));

    let mut results = storefront.use_cases().search_contents("drill");
    let first = timeout(Duration::from_secs(2), results.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first, SearchContents::NotReady);

    assert!(storefront.sync_and_index().await);

    loop {
        let next = timeout(Duration::from_secs(2), results.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let SearchContents::Ready(result) = next {
            if !result.items.is_empty() {
                assert_eq!(result.items[0].id, 7);
                break;
            }
        }
    }
}
