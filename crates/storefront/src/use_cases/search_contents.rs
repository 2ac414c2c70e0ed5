use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;

use storefront_api::{
    FollowableCategory, SearchContents, UserData, UserSearchResult, UserShopItem,
};

use super::{CatalogUseCases, Result};
use crate::reactive::{combine_latest, watch_stream};
use crate::search::{SearchIndexMaintainer, SearchMatches};
use crate::storage::SqliteCatalogStore;

/// Shorter queries are not sent to the index.
pub const SEARCH_QUERY_MIN_LENGTH: usize = 2;

impl CatalogUseCases {
    /// Categories and items matching `query`, in relevance order.
    ///
    /// Emits `SearchContents::NotReady` until the index has been populated.
    /// Matches whose entity no longer exists are dropped.
    pub fn search_contents(&self, query: impl Into<String>) -> BoxStream<'static, Result<SearchContents>> {
        let query = query.into();
        let store = self.store.clone();
        let search = self.search.clone();

        combine_latest(watch_stream(self.store.subscribe()), self.tracker.user_data())
            .then(move |(_, user_data)| {
                let store = store.clone();
                let search = search.clone();
                let query = query.clone();
                async move { resolve(&store, &search, &query, &user_data).await }
            })
            .boxed()
    }
}

async fn resolve(
    store: &SqliteCatalogStore,
    search: &SearchIndexMaintainer,
    query: &str,
    user_data: &UserData,
) -> Result<SearchContents> {
    let matches = if query.trim().chars().count() >= SEARCH_QUERY_MIN_LENGTH {
        search.search(query).await?
    } else if store.is_search_index_ready().await? {
        SearchMatches::Ready {
            category_ids: Vec::new(),
            shop_item_ids: Vec::new(),
        }
    } else {
        SearchMatches::NotReady
    };

    let (category_ids, shop_item_ids) = match matches {
        SearchMatches::NotReady => return Ok(SearchContents::NotReady),
        SearchMatches::Ready {
            category_ids,
            shop_item_ids,
        } => (category_ids, shop_item_ids),
    };

    let categories = if category_ids.is_empty() {
        Vec::new()
    } else {
        store.get_categories(Some(category_ids.as_slice())).await?
    };
    let items = store.get_populated_shop_items_by_ids(&shop_item_ids).await?;

    Ok(SearchContents::Ready(UserSearchResult {
        categories: in_match_order(&category_ids, categories, |c| c.id)
            .into_iter()
            .map(|category| FollowableCategory::new(category, user_data))
            .collect(),
        items: UserShopItem::map_all(in_match_order(&shop_item_ids, items, |i| i.id), user_data),
    }))
}

fn in_match_order<T, F>(order: &[i64], rows: Vec<T>, id_of: F) -> Vec<T>
where
    F: Fn(&T) -> i64,
{
    let mut by_id: HashMap<i64, T> = rows.into_iter().map(|row| (id_of(&row), row)).collect();
    order.iter().filter_map(|id| by_id.remove(id)).collect()
}
