use futures::stream::{BoxStream, StreamExt};

use storefront_api::{ShopItemId, ShopItemQuery, UserData, UserShopItem};

use super::{shared, CatalogUseCases, Result};
use crate::reactive::{combine_latest, watch_stream};
use crate::storage::SqliteCatalogStore;

impl CatalogUseCases {
    /// Items matching `query`, newest first, with the user's state attached.
    pub fn observe_items(&self, query: ShopItemQuery) -> BoxStream<'static, Result<Vec<UserShopItem>>> {
        combine_latest(
            shared(self.store.observe_populated_shop_items(query)),
            self.tracker.user_data(),
        )
        .map(|(items, user_data)| Ok(UserShopItem::map_all(items?, &user_data)))
        .boxed()
    }

    /// Bookmarked items that still exist locally, re-evaluated whenever the
    /// bookmark set or the catalog changes.
    pub fn observe_bookmarked(&self) -> BoxStream<'static, Result<Vec<UserShopItem>>> {
        self.observe_items_by(|user_data| user_data.bookmarked_items.iter().copied().collect())
    }

    /// Items in any followed category. Empty while nothing is followed.
    pub fn observe_followed_feed(&self) -> BoxStream<'static, Result<Vec<UserShopItem>>> {
        let store = self.store.clone();
        combine_latest(watch_stream(self.store.subscribe()), self.tracker.user_data())
            .then(move |(_, user_data)| {
                let store = store.clone();
                async move {
                    if user_data.followed_categories.is_empty() {
                        return Ok(Vec::new());
                    }
                    let query =
                        ShopItemQuery::with_category_ids(user_data.followed_categories.iter().copied());
                    let items = store.get_populated_shop_items(&query).await?;
                    Ok(UserShopItem::map_all(items, &user_data))
                }
            })
            .boxed()
    }

    fn observe_items_by<F>(&self, select_ids: F) -> BoxStream<'static, Result<Vec<UserShopItem>>>
    where
        F: Fn(&UserData) -> Vec<ShopItemId> + Send + Sync + 'static,
    {
        let store = self.store.clone();
        combine_latest(watch_stream(self.store.subscribe()), self.tracker.user_data())
            .then(move |(_, user_data)| {
                let store = store.clone();
                let ids = select_ids(&user_data);
                async move { load_user_items(&store, &ids, &user_data).await }
            })
            .boxed()
    }
}

/// Ids that no longer resolve are dropped.
async fn load_user_items(
    store: &SqliteCatalogStore,
    ids: &[ShopItemId],
    user_data: &UserData,
) -> Result<Vec<UserShopItem>> {
    let items = store.get_populated_shop_items_by_ids(ids).await?;
    Ok(UserShopItem::map_all(items, user_data))
}
