//! Read models emitted by the join layer
//!
//! These are built per emission by combining catalog rows with the latest
//! `UserData` snapshot. They are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{Category, CategoryId, ShopItem, ShopItemId};
use crate::user_data::UserData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowableCategory {
    pub category: Category,
    pub is_followed: bool,
}

impl FollowableCategory {
    pub fn new(category: Category, user_data: &UserData) -> Self {
        let is_followed = user_data.is_following(category.id);
        Self {
            category,
            is_followed,
        }
    }
}

/// A shop item decorated with the user's bookmark/viewed/follow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserShopItem {
    pub id: ShopItemId,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub stock: i64,
    pub images: Vec<String>,
    pub publish_date: DateTime<Utc>,
    pub item_type: String,
    pub followable_categories: Vec<FollowableCategory>,
    pub is_saved: bool,
    pub has_been_viewed: bool,
}

impl UserShopItem {
    pub fn new(item: ShopItem, user_data: &UserData) -> Self {
        Self {
            id: item.id,
            title: item.title,
            price: item.price,
            description: item.description,
            stock: item.stock,
            images: item.images,
            publish_date: item.publish_date,
            item_type: item.item_type,
            followable_categories: item
                .categories
                .into_iter()
                .map(|category| FollowableCategory::new(category, user_data))
                .collect(),
            is_saved: user_data.is_bookmarked(item.id),
            has_been_viewed: user_data.has_viewed(item.id),
        }
    }

    pub fn map_all(items: Vec<ShopItem>, user_data: &UserData) -> Vec<UserShopItem> {
        items
            .into_iter()
            .map(|item| UserShopItem::new(item, user_data))
            .collect()
    }
}

/// Ordering applied to followable categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySortField {
    /// Storage order.
    #[default]
    None,
    /// Ascending by name.
    Name,
}

/// Filters for item queries.
///
/// A missing or empty set places no restriction on that dimension. When both
/// are present an item must match the id filter and share at least one
/// category with the category filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItemQuery {
    pub filter_item_ids: Option<BTreeSet<ShopItemId>>,
    pub filter_category_ids: Option<BTreeSet<CategoryId>>,
}

impl ShopItemQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_item_ids<I: IntoIterator<Item = ShopItemId>>(ids: I) -> Self {
        Self {
            filter_item_ids: Some(ids.into_iter().collect()),
            filter_category_ids: None,
        }
    }

    pub fn with_category_ids<I: IntoIterator<Item = CategoryId>>(ids: I) -> Self {
        Self {
            filter_item_ids: None,
            filter_category_ids: Some(ids.into_iter().collect()),
        }
    }

    /// Id filter, if it restricts anything.
    pub fn item_ids(&self) -> Option<&BTreeSet<ShopItemId>> {
        self.filter_item_ids.as_ref().filter(|ids| !ids.is_empty())
    }

    /// Category filter, if it restricts anything.
    pub fn category_ids(&self) -> Option<&BTreeSet<CategoryId>> {
        self.filter_category_ids.as_ref().filter(|ids| !ids.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSearchResult {
    pub categories: Vec<FollowableCategory>,
    pub items: Vec<UserShopItem>,
}

/// Outcome of a search. `NotReady` means the index has never been populated,
/// which callers render differently from an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchContents {
    NotReady,
    Ready(UserSearchResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSearchQuery {
    pub query: String,
    pub queried_at: DateTime<Utc>,
}
