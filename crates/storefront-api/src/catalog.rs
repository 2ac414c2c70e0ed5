use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CategoryId = i64;
pub type ShopItemId = i64;

/// A catalog category. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    pub url: String,
    pub image_url: String,
}

impl Category {
    /// Placeholder row that satisfies an item's category reference until the
    /// category's own sync delivers the real data.
    pub fn shell(id: CategoryId) -> Self {
        Self {
            id,
            name: String::new(),
            short_description: String::new(),
            long_description: String::new(),
            url: String::new(),
            image_url: String::new(),
        }
    }

    pub fn is_shell(&self) -> bool {
        self.name.is_empty()
            && self.short_description.is_empty()
            && self.long_description.is_empty()
            && self.url.is_empty()
            && self.image_url.is_empty()
    }
}

/// A shop item joined with the categories it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: ShopItemId,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub stock: i64,
    /// Image URLs in display order.
    pub images: Vec<String>,
    pub publish_date: DateTime<Utc>,
    pub item_type: String,
    /// Ordered by category id.
    pub categories: Vec<Category>,
}
