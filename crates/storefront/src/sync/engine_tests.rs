use super::*;
use crate::preferences::InMemoryPreferencesStore;
use crate::testing::{network_category, network_shop_item, FailurePoint, FakeCatalogSource};
use storefront_api::{ChangeListEntry, ChangeListVersions, ShopItemQuery};

struct Harness {
    source: Arc<FakeCatalogSource>,
    store: SqliteCatalogStore,
    tracker: Arc<ChangeTracker>,
    engine: SyncEngine,
}

async fn harness() -> Harness {
    let source = Arc::new(FakeCatalogSource::new());
    let store = SqliteCatalogStore::open_in_memory().await.unwrap();
    let tracker = Arc::new(
        ChangeTracker::new(Arc::new(InMemoryPreferencesStore::new()), store.clone())
            .await
            .unwrap(),
    );
    let engine = SyncEngine::new(source.clone(), store.clone(), Arc::clone(&tracker));
    Harness {
        source,
        store,
        tracker,
        engine,
    }
}

#[cfg(test)]
mod single_type_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_category_after_watermark_is_applied() {
        let h = harness().await;
        h.tracker
            .update_change_list_versions(|_| ChangeListVersions {
                category_version: 5,
                shop_item_version: 9,
            })
            .await
            .unwrap();
        h.source.put_category_payload(network_category(42, "Tools"));
        h.source
            .push_change_list_entry(EntityType::Category, ChangeListEntry::upsert(42, 6));

        assert!(h.engine.sync(EntityType::Category).await);

        assert_eq!(h.store.get_category(42).await.unwrap().unwrap().name, "Tools");
        let versions = h.tracker.get_change_list_versions().await.unwrap();
        assert_eq!(versions.category_version, 6);
        assert_eq!(versions.shop_item_version, 9);
        assert_eq!(
            h.source.change_list_requests(),
            vec![(EntityType::Category, Some(5))]
        );
    }

    #[tokio::test]
    async fn test_delete_for_unknown_id_still_advances_watermark() {
        let h = harness().await;
        h.source.delete_category(99);

        let stats = h.engine.try_sync(EntityType::Category, None).await.unwrap();

        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.to_version, 1);
        assert_eq!(h.store.count_categories().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_payload_aborts_whole_pass() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        h.source.upsert_category(network_category(2, "Garden"));
        h.source.withhold_payload(EntityType::Category, 2);

        let err = h
            .engine
            .try_sync(EntityType::Category, None)
            .await
            .unwrap_err();

        match err {
            SyncError::MissingPayload { entity, ids } => {
                assert_eq!(entity, EntityType::Category);
                assert_eq!(ids, vec![2]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.store.count_categories().await.unwrap(), 0);
        assert_eq!(
            h.tracker
                .get_change_list_versions()
                .await
                .unwrap()
                .category_version,
            0
        );

        h.source.release_payload(EntityType::Category, 2);
        assert!(h.engine.sync(EntityType::Category).await);
        assert_eq!(h.store.count_categories().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_resolve_to_latest_entry() {
        let h = harness().await;
        h.source.upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![]));
        h.source.delete_shop_item(7);
        h.source.upsert_shop_item(network_shop_item(8, "Rake", 2, vec![]));

        let stats = h.engine.try_sync(EntityType::ShopItem, None).await.unwrap();

        assert_eq!(stats.upserted, 1);
        assert_eq!(stats.to_version, 3);
        let items = h
            .store
            .get_populated_shop_items(&ShopItemQuery::all())
            .await
            .unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![8]);
        // Only the surviving upsert is fetched
        assert_eq!(
            h.source.payload_requests(),
            vec![(EntityType::ShopItem, vec![8])]
        );
    }

    #[tokio::test]
    async fn test_item_sync_reports_shell_categories() {
        let h = harness().await;
        h.source
            .upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![42, 43]));

        let stats = h.engine.try_sync(EntityType::ShopItem, None).await.unwrap();

        assert_eq!(stats.shell_categories, 2);
        assert!(h.store.get_category(43).await.unwrap().unwrap().is_shell());
    }

    #[tokio::test]
    async fn test_replaying_sync_is_a_noop() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        h.source
            .upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1]));
        assert!(h.engine.sync_all().await);
        let generation = h.store.current_generation();

        let report = h.engine.sync_all_report(None).await;

        assert!(report.succeeded());
        assert!(!report.changed_data());
        assert_eq!(h.store.current_generation(), generation);
        assert_eq!(h.store.count_shop_item_categories().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_apply_rolls_back_deletes_and_watermark() {
        let h = harness().await;
        h.source
            .upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1]));
        h.source
            .upsert_shop_item(network_shop_item(8, "Rake", 2, vec![1]));
        assert!(h.engine.sync(EntityType::ShopItem).await);
        let generation = h.store.current_generation();

        sqlx::query(
            "CREATE TRIGGER reject_item_9 BEFORE INSERT ON shop_items WHEN NEW.id = 9 \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(h.store.pool())
        .await
        .unwrap();
        h.source.delete_shop_item(7);
        h.source
            .upsert_shop_item(network_shop_item(9, "Trowel", 3, vec![1]));

        assert!(!h.engine.sync(EntityType::ShopItem).await);

        let versions = h.tracker.get_change_list_versions().await.unwrap();
        assert_eq!(versions.shop_item_version, 2);
        let ids: Vec<_> = h
            .store
            .get_populated_shop_items(&ShopItemQuery::all())
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![8, 7]);
        assert_eq!(h.store.count_shop_item_categories().await.unwrap(), 2);
        assert_eq!(h.store.current_generation(), generation);

        sqlx::query("DROP TRIGGER reject_item_9")
            .execute(h.store.pool())
            .await
            .unwrap();
        assert!(h.engine.sync(EntityType::ShopItem).await);
        assert_eq!(
            h.tracker.get_change_list_versions().await.unwrap().shop_item_version,
            4
        );
        assert!(h.store.get_populated_shop_items_by_ids(&[7]).await.unwrap().is_empty());
    }
}

#[cfg(test)]
mod joint_sync_tests {
    use super::*;

    #[tokio::test]
    async fn test_item_failure_keeps_item_cursor_and_category_progress() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        h.source
            .upsert_shop_item(network_shop_item(7, "Hammer", 1, vec![1]));
        h.source.fail(FailurePoint::Payload(EntityType::ShopItem));

        assert!(!h.engine.sync_all().await);

        let versions = h.tracker.get_change_list_versions().await.unwrap();
        assert_eq!(versions.category_version, 1);
        assert_eq!(versions.shop_item_version, 0);
        assert_eq!(h.store.count_categories().await.unwrap(), 1);
        assert_eq!(h.store.count_shop_items().await.unwrap(), 0);

        h.source.heal(FailurePoint::Payload(EntityType::ShopItem));
        h.source.clear_requests();

        assert!(h.engine.sync_all().await);

        let mut requests = h.source.change_list_requests();
        requests.sort();
        assert_eq!(
            requests,
            vec![
                (EntityType::Category, Some(1)),
                (EntityType::ShopItem, Some(0)),
            ]
        );
        // Categories were already current, so only items were fetched
        assert_eq!(
            h.source.payload_requests(),
            vec![(EntityType::ShopItem, vec![7])]
        );
        assert_eq!(h.store.count_shop_items().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_change_list_failure_reports_false() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        h.source.fail(FailurePoint::ChangeList(EntityType::Category));

        assert!(!h.engine.sync(EntityType::Category).await);
        assert_eq!(h.store.count_categories().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_touches_nothing() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        let (_cancel_tx, cancel_rx) = watch::channel(true);

        assert!(!h.engine.sync_all_with(cancel_rx).await);

        assert!(h.source.change_list_requests().is_empty());
        assert_eq!(h.store.count_categories().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_uncancelled_token_syncs_normally() {
        let h = harness().await;
        h.source.upsert_category(network_category(1, "Tools"));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        assert!(h.engine.sync_all_with(cancel_rx).await);
        assert_eq!(h.store.count_categories().await.unwrap(), 1);
    }
}
