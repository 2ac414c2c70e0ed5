//! Catalog bundled into the binary
//!
//! Serves a fixed snapshot. Change-lists are derived from the listing order,
//! so a fresh install receives everything at once and a replay after the last
//! version receives nothing.

use async_trait::async_trait;
use tracing::debug;

use storefront_api::network::versioned_change_list;
use storefront_api::{
    ApiError, CatalogNetworkDataSource, CategoryId, ChangeListEntry, NetworkCategory,
    NetworkShopItem, Result, ShopItemId,
};

use crate::models::DemoCatalog;

const DEMO_CATALOG: &str = include_str!("../assets/demo_catalog.json");

pub struct DemoCatalogSource {
    catalog: DemoCatalog,
}

impl DemoCatalogSource {
    pub fn new() -> Result<Self> {
        Self::from_json(DEMO_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: DemoCatalog = serde_json::from_str(json)
            .map_err(|e| ApiError::decode(format!("Invalid demo catalog: {}", e)))?;
        debug!(
            "[DemoCatalogSource] Loaded {} categories, {} shop items",
            catalog.categories.len(),
            catalog.shop_items.len()
        );
        Ok(Self { catalog })
    }
}

fn select<T: Clone>(entities: &[T], ids: Option<&[i64]>, id_of: impl Fn(&T) -> i64) -> Vec<T> {
    match ids {
        Some(ids) => entities
            .iter()
            .filter(|entity| ids.contains(&id_of(entity)))
            .cloned()
            .collect(),
        None => entities.to_vec(),
    }
}

#[async_trait]
impl CatalogNetworkDataSource for DemoCatalogSource {
    fn source_name(&self) -> &str {
        "demo"
    }

    async fn get_categories(&self, ids: Option<&[CategoryId]>) -> Result<Vec<NetworkCategory>> {
        Ok(select(&self.catalog.categories, ids, |c| c.id))
    }

    async fn get_shop_items(&self, ids: Option<&[ShopItemId]>) -> Result<Vec<NetworkShopItem>> {
        Ok(select(&self.catalog.shop_items, ids, |i| i.id))
    }

    async fn get_category_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        Ok(versioned_change_list(
            self.catalog.categories.iter().map(|c| c.id),
            after,
        ))
    }

    async fn get_shop_item_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        Ok(versioned_change_list(
            self.catalog.shop_items.iter().map(|i| i.id),
            after,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_catalog_decodes() {
        let source = DemoCatalogSource::new().unwrap();
        let categories = source.get_categories(None).await.unwrap();
        let items = source.get_shop_items(None).await.unwrap();

        assert!(!categories.is_empty());
        assert!(!items.is_empty());
        for item in &items {
            for category in &item.categories {
                assert!(categories.iter().any(|c| c.id == *category));
            }
        }
    }

    #[tokio::test]
    async fn test_ids_filter_ignores_unknown_ids() {
        let source = DemoCatalogSource::new().unwrap();
        let categories = source.get_categories(Some(&[2, 999][..])).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, 2);
    }

    #[tokio::test]
    async fn test_change_list_after_last_version_is_empty() {
        let source = DemoCatalogSource::new().unwrap();
        let all = source.get_shop_item_change_list(None).await.unwrap();
        let last = all.iter().map(|e| e.change_list_version).max().unwrap();

        assert!(all.iter().all(|e| !e.is_delete));
        assert!(source
            .get_shop_item_change_list(Some(last))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            source.get_shop_item_change_list(Some(last - 1)).await.unwrap().len(),
            1
        );
    }

    #[test]
    fn test_malformed_catalog_is_a_decode_error() {
        let err = DemoCatalogSource::from_json("{\"categories\": 3}").err().unwrap();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
