//! Remote catalog boundary
//!
//! Payload shapes returned by the remote catalog and the trait every remote
//! source variant (demo asset, HTTP) implements. Change-lists never carry a
//! payload; the full entities are fetched separately by id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Category, CategoryId, ShopItemId};
use crate::change_list::{ChangeListEntry, EntityType};
use crate::Result;

/// Category as served by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCategory {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

impl From<NetworkCategory> for Category {
    fn from(n: NetworkCategory) -> Self {
        Category {
            id: n.id,
            name: n.name,
            short_description: n.short_description,
            long_description: n.long_description,
            url: n.url,
            image_url: n.image_url,
        }
    }
}

/// Shop item as served by the remote catalog.
///
/// Categories are referenced by id only; a referenced id may not have been
/// synced locally yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkShopItem {
    pub id: ShopItemId,
    pub title: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
    pub publish_date: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

/// Remote source of catalog data and change-lists.
///
/// Implemented by the bundled demo source and the HTTP source; tests use an
/// in-memory fake. `ids = None` means "everything"; `after = None` means
/// "from the beginning".
#[async_trait]
pub trait CatalogNetworkDataSource: Send + Sync {
    /// Identifier used in logs (e.g. "demo", "http").
    fn source_name(&self) -> &str;

    async fn get_categories(&self, ids: Option<&[CategoryId]>) -> Result<Vec<NetworkCategory>>;

    async fn get_shop_items(&self, ids: Option<&[ShopItemId]>) -> Result<Vec<NetworkShopItem>>;

    async fn get_category_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>>;

    async fn get_shop_item_change_list(&self, after: Option<i64>)
        -> Result<Vec<ChangeListEntry>>;

    /// Dispatches to the change-list endpoint for `entity`.
    async fn get_change_list(
        &self,
        entity: EntityType,
        after: Option<i64>,
    ) -> Result<Vec<ChangeListEntry>> {
        match entity {
            EntityType::Category => self.get_category_change_list(after).await,
            EntityType::ShopItem => self.get_shop_item_change_list(after).await,
        }
    }
}

/// Builds a change-list from an entity listing, versioning entries by their
/// position (starting at 1) and dropping entries at or below `after`.
pub fn versioned_change_list<I>(ids: I, after: Option<i64>) -> Vec<ChangeListEntry>
where
    I: IntoIterator<Item = i64>,
{
    let after = after.unwrap_or(0);
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| ChangeListEntry::upsert(id, index as i64 + 1))
        .filter(|entry| entry.change_list_version > after)
        .collect()
}
