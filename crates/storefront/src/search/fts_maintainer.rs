use tracing::{debug, info, warn};

use storefront_api::{Category, CategoryId, ShopItem, ShopItemId};

use super::query::build_match_expression;
use crate::storage::{
    CategoryFtsRow, FtsCounts, Result, ShopItemFtsRow, SqliteCatalogStore,
};

/// Ids matched by a search, per entity type, best match first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMatches {
    /// The index has never been populated.
    NotReady,
    Ready {
        category_ids: Vec<CategoryId>,
        shop_item_ids: Vec<ShopItemId>,
    },
}

impl SearchMatches {
    fn empty() -> Self {
        SearchMatches::Ready {
            category_ids: Vec::new(),
            shop_item_ids: Vec::new(),
        }
    }
}

/// Keeps the text index in step with the relational tables and answers
/// text queries against it.
#[derive(Debug, Clone)]
pub struct SearchIndexMaintainer {
    store: SqliteCatalogStore,
}

impl SearchIndexMaintainer {
    pub fn new(store: SqliteCatalogStore) -> Self {
        Self { store }
    }

    /// Rebuilds the whole index from every category and every populated item.
    ///
    /// Afterwards the index holds exactly one row per category and per item.
    #[tracing::instrument(skip(self))]
    pub async fn populate_fts_data(&self) -> Result<FtsCounts> {
        let (categories, items) = self.store.get_catalog_snapshot().await?;

        let category_rows: Vec<CategoryFtsRow> = categories.iter().map(category_row).collect();
        let item_rows: Vec<ShopItemFtsRow> = items.iter().map(shop_item_row).collect();

        let counts = self.store.replace_fts_rows(&category_rows, &item_rows).await?;
        info!(
            "[SearchIndexMaintainer] Indexed {} categories and {} shop items",
            counts.categories, counts.shop_items
        );
        Ok(counts)
    }

    /// Matching ids per entity type.
    ///
    /// Queries with no searchable words, and queries the index rejects,
    /// yield an empty match rather than an error.
    pub async fn search(&self, raw_query: &str) -> Result<SearchMatches> {
        if !self.store.is_search_index_ready().await? {
            return Ok(SearchMatches::NotReady);
        }

        let Some(expression) = build_match_expression(raw_query) else {
            return Ok(SearchMatches::empty());
        };

        let category_ids = match self.store.search_category_ids(&expression).await {
            Ok(ids) => ids,
            Err(e) => return Ok(rejected(raw_query, e)),
        };
        let shop_item_ids = match self.store.search_shop_item_ids(&expression).await {
            Ok(ids) => ids,
            Err(e) => return Ok(rejected(raw_query, e)),
        };

        debug!(
            "[SearchIndexMaintainer] '{}' matched {} categories, {} shop items",
            raw_query,
            category_ids.len(),
            shop_item_ids.len()
        );
        Ok(SearchMatches::Ready {
            category_ids,
            shop_item_ids,
        })
    }
}

fn rejected(raw_query: &str, error: crate::storage::StorageError) -> SearchMatches {
    warn!(
        "[SearchIndexMaintainer] Query '{}' rejected by index: {}",
        raw_query, error
    );
    SearchMatches::empty()
}

fn category_row(category: &Category) -> CategoryFtsRow {
    CategoryFtsRow {
        category_id: category.id,
        name: category.name.clone(),
        short_description: category.short_description.clone(),
        long_description: category.long_description.clone(),
    }
}

fn shop_item_row(item: &ShopItem) -> ShopItemFtsRow {
    ShopItemFtsRow {
        shop_item_id: item.id,
        title: item.title.clone(),
        description: item.description.clone(),
    }
}
