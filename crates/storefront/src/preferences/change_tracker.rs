use futures::stream::BoxStream;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error};

use storefront_api::{
    CategoryId, ChangeListVersions, DarkThemeConfig, ShopItemId, ThemeBrand, UserData,
};

use super::preferences_store::PreferencesStore;
use crate::reactive::watch_stream;
use crate::storage::{Result, SqliteCatalogStore};

/// Owner of the per-user sets and the change-list watermark.
///
/// Preference mutators go through a single writer: the new document is
/// persisted first and published to subscribers only once the write
/// succeeded. A failed write is logged and the visible state stays as it was.
pub struct ChangeTracker {
    preferences: Arc<dyn PreferencesStore>,
    catalog: SqliteCatalogStore,
    writer: Mutex<()>,
    user_data: watch::Sender<UserData>,
}

impl ChangeTracker {
    pub async fn new(
        preferences: Arc<dyn PreferencesStore>,
        catalog: SqliteCatalogStore,
    ) -> Result<Self> {
        let initial = preferences.load().await?;
        let (user_data, _) = watch::channel(initial);
        Ok(Self {
            preferences,
            catalog,
            writer: Mutex::new(()),
            user_data,
        })
    }

    /// Current snapshot followed by every published update.
    pub fn user_data(&self) -> BoxStream<'static, UserData> {
        watch_stream(self.user_data.subscribe())
    }

    pub fn subscribe(&self) -> watch::Receiver<UserData> {
        self.user_data.subscribe()
    }

    pub fn current_user_data(&self) -> UserData {
        self.user_data.borrow().clone()
    }

    pub async fn get_change_list_versions(&self) -> Result<ChangeListVersions> {
        self.catalog.get_change_list_versions().await
    }

    /// Stored versions only move forward; a transform that lowers one is
    /// ignored for that entity.
    pub async fn update_change_list_versions<F>(&self, transform: F) -> Result<ChangeListVersions>
    where
        F: Fn(ChangeListVersions) -> ChangeListVersions,
    {
        self.catalog.update_change_list_versions(transform).await
    }

    pub async fn set_followed_category(&self, id: CategoryId, followed: bool) {
        self.update("followed category", |data| {
            toggle(&mut data.followed_categories, id, followed);
            data.reset_onboarding_if_unfollowed();
        })
        .await;
    }

    pub async fn set_followed_categories(&self, ids: BTreeSet<CategoryId>) {
        self.update("followed categories", move |data| {
            data.followed_categories = ids;
            data.reset_onboarding_if_unfollowed();
        })
        .await;
    }

    pub async fn set_followed_creator(&self, id: i64, followed: bool) {
        self.update("followed creator", |data| {
            toggle(&mut data.followed_creators, id, followed);
            data.reset_onboarding_if_unfollowed();
        })
        .await;
    }

    pub async fn set_item_bookmarked(&self, id: ShopItemId, bookmarked: bool) {
        self.update("bookmark", |data| {
            toggle(&mut data.bookmarked_items, id, bookmarked);
        })
        .await;
    }

    pub async fn set_item_viewed(&self, id: ShopItemId, viewed: bool) {
        self.update("viewed item", |data| {
            toggle(&mut data.viewed_items, id, viewed);
        })
        .await;
    }

    pub async fn set_should_hide_onboarding(&self, hide: bool) {
        self.update("onboarding flag", |data| {
            data.should_hide_onboarding = hide;
        })
        .await;
    }

    pub async fn set_theme_brand(&self, brand: ThemeBrand) {
        self.update("theme brand", |data| data.theme_brand = brand).await;
    }

    pub async fn set_dark_theme_config(&self, config: DarkThemeConfig) {
        self.update("dark theme config", |data| data.dark_theme_config = config)
            .await;
    }

    pub async fn set_dynamic_color_preference(&self, use_dynamic_color: bool) {
        self.update("dynamic color", |data| {
            data.use_dynamic_color = use_dynamic_color;
        })
        .await;
    }

    async fn update<F>(&self, what: &str, mutate: F)
    where
        F: FnOnce(&mut UserData),
    {
        let _writer = self.writer.lock().await;

        let current = self.user_data.borrow().clone();
        let mut next = current.clone();
        mutate(&mut next);
        if next == current {
            return;
        }

        match self.preferences.save(&next).await {
            Ok(()) => {
                self.user_data.send_replace(next);
                debug!("[ChangeTracker] Updated {}", what);
            }
            Err(e) => {
                error!("[ChangeTracker] Failed to persist {}: {}", what, e);
            }
        }
    }
}

fn toggle(set: &mut BTreeSet<i64>, id: i64, present: bool) {
    if present {
        set.insert(id);
    } else {
        set.remove(&id);
    }
}
