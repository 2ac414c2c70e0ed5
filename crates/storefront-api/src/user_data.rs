use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{CategoryId, ShopItemId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeBrand {
    #[default]
    Default,
    Android,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DarkThemeConfig {
    #[default]
    FollowSystem,
    Light,
    Dark,
}

/// Snapshot of the user's personal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub bookmarked_items: BTreeSet<ShopItemId>,
    pub viewed_items: BTreeSet<ShopItemId>,
    pub followed_categories: BTreeSet<CategoryId>,
    /// Secondary followed set; together with `followed_categories` it drives
    /// the onboarding flag.
    pub followed_creators: BTreeSet<i64>,
    pub theme_brand: ThemeBrand,
    pub dark_theme_config: DarkThemeConfig,
    pub use_dynamic_color: bool,
    pub should_hide_onboarding: bool,
}

impl UserData {
    pub fn is_bookmarked(&self, id: ShopItemId) -> bool {
        self.bookmarked_items.contains(&id)
    }

    pub fn has_viewed(&self, id: ShopItemId) -> bool {
        self.viewed_items.contains(&id)
    }

    pub fn is_following(&self, id: CategoryId) -> bool {
        self.followed_categories.contains(&id)
    }

    /// Clears the onboarding flag when nothing is followed any more.
    ///
    /// Must run inside the same update that changed a followed set.
    pub fn reset_onboarding_if_unfollowed(&mut self) {
        if self.followed_categories.is_empty() && self.followed_creators.is_empty() {
            self.should_hide_onboarding = false;
        }
    }
}
