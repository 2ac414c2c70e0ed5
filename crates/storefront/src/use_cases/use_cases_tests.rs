use super::*;
use crate::preferences::InMemoryPreferencesStore;
use crate::testing::{network_category, network_shop_item};
use futures::{Stream, StreamExt};
use std::time::Duration;
use storefront_api::{
    AsResult, Category, CategorySortField, SearchContents, ShopItemQuery, UiResult,
};
use tokio::time::timeout;

struct Harness {
    store: SqliteCatalogStore,
    tracker: Arc<ChangeTracker>,
    search: SearchIndexMaintainer,
    use_cases: CatalogUseCases,
}

async fn harness() -> Harness {
    let store = SqliteCatalogStore::open_in_memory().await.unwrap();
    let tracker = Arc::new(
        ChangeTracker::new(Arc::new(InMemoryPreferencesStore::new()), store.clone())
            .await
            .unwrap(),
    );
    let search = SearchIndexMaintainer::new(store.clone());
    let use_cases = CatalogUseCases::new(store.clone(), Arc::clone(&tracker), search.clone());
    Harness {
        store,
        tracker,
        search,
        use_cases,
    }
}

async fn seed(store: &SqliteCatalogStore) {
    store
        .apply_category_changes(
            &[],
            &[
                Category::from(network_category(1, "Tools")),
                Category::from(network_category(2, "Garden")),
                Category::from(network_category(3, "Automotive")),
            ],
            3,
        )
        .await
        .unwrap();
    store
        .apply_shop_item_changes(
            &[],
            &[
                network_shop_item(7, "Claw hammer", 1, vec![1]),
                network_shop_item(8, "Garden rake", 3, vec![2]),
                network_shop_item(9, "Tool bag", 2, vec![1, 2]),
            ],
            3,
        )
        .await
        .unwrap();
}

/// Pulls from `stream` until an item satisfies `accept`.
async fn next_matching<S, T, F>(stream: &mut S, accept: F) -> T
where
    S: Stream<Item = T> + Unpin,
    F: Fn(&T) -> bool,
{
    loop {
        let item = timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for emission")
            .expect("stream ended");
        if accept(&item) {
            return item;
        }
    }
}

#[cfg(test)]
mod followable_category_tests {
    use super::*;

    #[tokio::test]
    async fn test_name_sort_and_follow_state() {
        let h = harness().await;
        seed(&h.store).await;
        h.tracker.set_followed_category(2, true).await;

        let mut stream = h.use_cases.get_followable_categories(CategorySortField::Name);
        let categories = next_matching(&mut stream, |r| {
            r.as_ref().map_or(false, |c| c.iter().any(|f| f.is_followed))
        })
        .await
        .unwrap();

        let names: Vec<_> = categories.iter().map(|f| f.category.name.as_str()).collect();
        assert_eq!(names, vec!["Automotive", "Garden", "Tools"]);
        for followable in &categories {
            assert_eq!(followable.is_followed, followable.category.id == 2);
        }
    }

    #[tokio::test]
    async fn test_storage_order_when_unsorted() {
        let h = harness().await;
        seed(&h.store).await;

        let mut stream = h.use_cases.get_followable_categories(CategorySortField::None);
        let categories = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        let ids: Vec<_> = categories.iter().map(|f| f.category.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_following_re_emits() {
        let h = harness().await;
        seed(&h.store).await;
        let mut stream = h.use_cases.get_followable_categories(CategorySortField::None);
        next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        h.tracker.set_followed_category(3, true).await;

        let categories = next_matching(&mut stream, |r| {
            r.as_ref()
                .map_or(false, |c| c.iter().any(|f| f.category.id == 3 && f.is_followed))
        })
        .await
        .unwrap();
        assert_eq!(categories.iter().filter(|f| f.is_followed).count(), 1);
    }
}

#[cfg(test)]
mod shop_item_tests {
    use super::*;

    #[tokio::test]
    async fn test_items_are_filtered_ordered_and_enriched() {
        let h = harness().await;
        seed(&h.store).await;
        h.tracker.set_item_bookmarked(9, true).await;
        h.tracker.set_item_viewed(7, true).await;
        h.tracker.set_followed_category(1, true).await;

        let mut stream = h.use_cases.observe_items(ShopItemQuery::with_category_ids([1]));
        let items = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![9, 7]);
        assert!(items[0].is_saved);
        assert!(!items[0].has_been_viewed);
        assert!(items[1].has_been_viewed);
        let tool_bag_follows: Vec<_> = items[0]
            .followable_categories
            .iter()
            .map(|f| (f.category.id, f.is_followed))
            .collect();
        assert_eq!(tool_bag_follows, vec![(1, true), (2, false)]);
    }

    #[tokio::test]
    async fn test_deleted_bookmark_disappears_from_bookmarks() {
        let h = harness().await;
        seed(&h.store).await;
        h.tracker.set_item_bookmarked(7, true).await;

        let mut stream = h.use_cases.observe_bookmarked();
        let before = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();
        assert_eq!(before.iter().map(|i| i.id).collect::<Vec<_>>(), vec![7]);

        h.store.apply_shop_item_changes(&[7], &[], 4).await.unwrap();

        let after = next_matching(&mut stream, |r| {
            r.as_ref().map_or(false, |items| items.is_empty())
        })
        .await
        .unwrap();
        assert!(after.is_empty());
        assert!(h.tracker.current_user_data().is_bookmarked(7));
    }

    #[tokio::test]
    async fn test_bookmarking_re_emits() {
        let h = harness().await;
        seed(&h.store).await;
        let mut stream = h.use_cases.observe_bookmarked();
        assert!(next_matching(&mut stream, |r| r.is_ok()).await.unwrap().is_empty());

        h.tracker.set_item_bookmarked(8, true).await;

        let items = next_matching(&mut stream, |r| {
            r.as_ref().map_or(false, |items| !items.is_empty())
        })
        .await
        .unwrap();
        assert_eq!(items[0].id, 8);
        assert!(items[0].is_saved);
    }

    #[tokio::test]
    async fn test_followed_feed_tracks_follows() {
        let h = harness().await;
        seed(&h.store).await;
        let mut stream = h.use_cases.observe_followed_feed();
        assert!(next_matching(&mut stream, |r| r.is_ok()).await.unwrap().is_empty());

        h.tracker.set_followed_category(2, true).await;

        let items = next_matching(&mut stream, |r| {
            r.as_ref().map_or(false, |items| !items.is_empty())
        })
        .await
        .unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![8, 9]);
    }

    #[tokio::test]
    async fn test_as_result_starts_with_loading() {
        let h = harness().await;
        seed(&h.store).await;

        let mut states = h.use_cases.observe_items(ShopItemQuery::all()).as_result();

        assert_eq!(states.next().await, Some(UiResult::Loading));
        match next_matching(&mut states, |s| !matches!(s, UiResult::Loading)).await {
            UiResult::Success(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected state: {:?}", other),
        }
    }
}

#[cfg(test)]
mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_not_ready_until_first_population() {
        let h = harness().await;
        seed(&h.store).await;

        let mut stream = h.use_cases.search_contents("hammer");
        let first = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();
        assert_eq!(first, SearchContents::NotReady);

        h.search.populate_fts_data().await.unwrap();

        let ready = next_matching(&mut stream, |r| {
            matches!(r, Ok(SearchContents::Ready(_)))
        })
        .await
        .unwrap();
        match ready {
            SearchContents::Ready(result) => {
                assert_eq!(result.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![7]);
                assert!(result.categories.is_empty());
            }
            SearchContents::NotReady => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_matches_resolve_to_user_models() {
        let h = harness().await;
        seed(&h.store).await;
        h.search.populate_fts_data().await.unwrap();
        h.tracker.set_followed_category(2, true).await;

        let mut stream = h.use_cases.search_contents("garden");
        let contents = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        match contents {
            SearchContents::Ready(result) => {
                assert_eq!(result.categories.len(), 1);
                assert!(result.categories[0].is_followed);
                assert_eq!(result.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![8]);
            }
            SearchContents::NotReady => panic!("index should be ready"),
        }
    }

    #[tokio::test]
    async fn test_stale_index_entries_are_dropped() {
        let h = harness().await;
        seed(&h.store).await;
        h.search.populate_fts_data().await.unwrap();
        h.store.apply_shop_item_changes(&[7], &[], 4).await.unwrap();

        let mut stream = h.use_cases.search_contents("hammer");
        let contents = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        assert_eq!(contents, SearchContents::Ready(Default::default()));
    }

    #[tokio::test]
    async fn test_short_query_is_empty_once_ready() {
        let h = harness().await;
        seed(&h.store).await;
        h.search.populate_fts_data().await.unwrap();

        let mut stream = h.use_cases.search_contents("h");
        let contents = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();

        assert_eq!(contents, SearchContents::Ready(Default::default()));
    }

    #[tokio::test]
    async fn test_recent_searches_most_recent_first() {
        let h = harness().await;
        h.use_cases.insert_or_replace_recent_search("rake").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.use_cases.insert_or_replace_recent_search(" hammer ").await.unwrap();
        h.use_cases.insert_or_replace_recent_search("   ").await.unwrap();

        let mut stream = h.use_cases.observe_recent_search_queries(10);
        let recent = next_matching(&mut stream, |r| r.is_ok()).await.unwrap();
        let queries: Vec<_> = recent.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["hammer", "rake"]);

        h.use_cases.clear_recent_searches().await.unwrap();
        next_matching(&mut stream, |r| r.as_ref().map_or(false, |q| q.is_empty())).await;
    }

    #[tokio::test]
    async fn test_search_contents_count_follows_population() {
        let h = harness().await;
        seed(&h.store).await;
        let mut counts = h.use_cases.observe_search_contents_count();
        assert_eq!(next_matching(&mut counts, |r| r.is_ok()).await.unwrap(), 0);

        h.search.populate_fts_data().await.unwrap();

        assert_eq!(
            next_matching(&mut counts, |r| matches!(r, Ok(n) if *n > 0))
                .await
                .unwrap(),
            6
        );
    }
}
