use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity types that are synchronised through a change-list feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Category,
    ShopItem,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Category, EntityType::ShopItem];

    /// Stable key used for the persisted watermark row.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Category => "category",
            EntityType::ShopItem => "shop_item",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "category" => Some(EntityType::Category),
            "shop_item" => Some(EntityType::ShopItem),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a change-list feed. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeListEntry {
    pub id: i64,
    pub change_list_version: i64,
    pub is_delete: bool,
}

impl ChangeListEntry {
    pub fn upsert(id: i64, change_list_version: i64) -> Self {
        Self {
            id,
            change_list_version,
            is_delete: false,
        }
    }

    pub fn delete(id: i64, change_list_version: i64) -> Self {
        Self {
            id,
            change_list_version,
            is_delete: true,
        }
    }
}

/// Local watermark: the highest change-list version applied per entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListVersions {
    pub category_version: i64,
    pub shop_item_version: i64,
}

impl ChangeListVersions {
    pub fn version_for(&self, entity: EntityType) -> i64 {
        match entity {
            EntityType::Category => self.category_version,
            EntityType::ShopItem => self.shop_item_version,
        }
    }

    /// Returns a copy with `entity`'s version raised to `version`.
    /// Never lowers a version.
    pub fn advanced(mut self, entity: EntityType, version: i64) -> Self {
        match entity {
            EntityType::Category => self.category_version = self.category_version.max(version),
            EntityType::ShopItem => self.shop_item_version = self.shop_item_version.max(version),
        }
        self
    }
}
