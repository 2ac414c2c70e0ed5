//! Sync engine
//!
//! One pass per entity type:
//! 1. read the watermark
//! 2. fetch the change-list after it
//! 3. reduce it to one delete-or-upsert per id
//! 4. fetch full payloads for the upserts
//! 5. apply deletes, upserts and the new watermark in one transaction
//!
//! Category and shop item passes run concurrently. Passes of the same type
//! are serialised by a per-type lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use storefront_api::{CatalogNetworkDataSource, Category, EntityType, NetworkShopItem};

use super::change_list::{partition_change_list, PartitionedChanges};
use super::sync_stats::SyncStats;
use super::{Result, SyncError};
use crate::preferences::ChangeTracker;
use crate::storage::SqliteCatalogStore;

/// Per-type results of a joint sync.
#[derive(Debug)]
pub struct SyncReport {
    pub categories: Result<SyncStats>,
    pub shop_items: Result<SyncStats>,
}

impl SyncReport {
    /// True only when every entity type committed.
    pub fn succeeded(&self) -> bool {
        self.categories.is_ok() && self.shop_items.is_ok()
    }

    /// True when at least one pass changed local data.
    pub fn changed_data(&self) -> bool {
        [&self.categories, &self.shop_items]
            .into_iter()
            .any(|result| matches!(result, Ok(stats) if !stats.is_noop()))
    }
}

pub struct SyncEngine {
    source: Arc<dyn CatalogNetworkDataSource>,
    store: SqliteCatalogStore,
    tracker: Arc<ChangeTracker>,
    category_lock: Mutex<()>,
    shop_item_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn CatalogNetworkDataSource>,
        store: SqliteCatalogStore,
        tracker: Arc<ChangeTracker>,
    ) -> Self {
        Self {
            source,
            store,
            tracker,
            category_lock: Mutex::new(()),
            shop_item_lock: Mutex::new(()),
        }
    }

    /// Syncs one entity type. Failures are logged and reported as `false`;
    /// the watermark is left where it was.
    pub async fn sync(&self, entity: EntityType) -> bool {
        log_outcome(entity, self.try_sync(entity, None).await)
    }

    /// Syncs both entity types concurrently. `true` only if both committed.
    pub async fn sync_all(&self) -> bool {
        self.sync_all_report(None).await.succeeded()
    }

    /// Like [`sync_all`](Self::sync_all), but a pass that has not started
    /// applying when `cancel` turns `true` is abandoned. A pass whose
    /// transaction has begun always runs to completion.
    pub async fn sync_all_with(&self, cancel: watch::Receiver<bool>) -> bool {
        self.sync_all_report(Some(&cancel)).await.succeeded()
    }

    /// Runs both passes to completion and returns each outcome.
    pub async fn sync_all_report(&self, cancel: Option<&watch::Receiver<bool>>) -> SyncReport {
        let (categories, shop_items) = tokio::join!(
            self.try_sync(EntityType::Category, cancel),
            self.try_sync(EntityType::ShopItem, cancel),
        );
        log_outcome_ref(EntityType::Category, &categories);
        log_outcome_ref(EntityType::ShopItem, &shop_items);
        SyncReport {
            categories,
            shop_items,
        }
    }

    #[tracing::instrument(skip(self, cancel), fields(source = self.source.source_name()))]
    pub async fn try_sync(
        &self,
        entity: EntityType,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<SyncStats> {
        ensure_not_cancelled(entity, cancel)?;
        let _pass = self.lock_for(entity).lock().await;

        let from_version = self
            .tracker
            .get_change_list_versions()
            .await?
            .version_for(entity);

        let entries = self
            .source
            .get_change_list(entity, Some(from_version))
            .await?;
        let changes = partition_change_list(&entries, from_version);
        let to_version = changes.target_version(from_version);

        debug!(
            "[SyncEngine] {} change-list after v{}: {} entries, {} deletes, {} upserts",
            entity,
            from_version,
            entries.len(),
            changes.to_delete.len(),
            changes.to_upsert.len()
        );

        let applied = match entity {
            EntityType::Category => {
                let upserts = self.fetch_categories(&changes).await?;
                ensure_not_cancelled(entity, cancel)?;
                self.store
                    .apply_category_changes(&changes.to_delete, &upserts, to_version)
                    .await?
            }
            EntityType::ShopItem => {
                let upserts = self.fetch_shop_items(&changes).await?;
                ensure_not_cancelled(entity, cancel)?;
                self.store
                    .apply_shop_item_changes(&changes.to_delete, &upserts, to_version)
                    .await?
            }
        };

        Ok(SyncStats::new(entity, from_version, to_version, applied))
    }

    fn lock_for(&self, entity: EntityType) -> &Mutex<()> {
        match entity {
            EntityType::Category => &self.category_lock,
            EntityType::ShopItem => &self.shop_item_lock,
        }
    }

    async fn fetch_categories(&self, changes: &PartitionedChanges) -> Result<Vec<Category>> {
        if changes.to_upsert.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = self
            .source
            .get_categories(Some(changes.to_upsert.as_slice()))
            .await?;
        let ordered = select_payloads(EntityType::Category, &changes.to_upsert, fetched, |c| c.id)?;
        Ok(ordered.into_iter().map(Category::from).collect())
    }

    async fn fetch_shop_items(&self, changes: &PartitionedChanges) -> Result<Vec<NetworkShopItem>> {
        if changes.to_upsert.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = self
            .source
            .get_shop_items(Some(changes.to_upsert.as_slice()))
            .await?;
        select_payloads(EntityType::ShopItem, &changes.to_upsert, fetched, |i| i.id)
    }
}

/// Orders `fetched` like `requested`, dropping unrequested entities. Any
/// requested id without a payload aborts the pass.
fn select_payloads<T, F>(
    entity: EntityType,
    requested: &[i64],
    fetched: Vec<T>,
    id_of: F,
) -> Result<Vec<T>>
where
    F: Fn(&T) -> i64,
{
    let mut by_id: HashMap<i64, T> = fetched.into_iter().map(|p| (id_of(&p), p)).collect();

    let mut selected = Vec::with_capacity(requested.len());
    let mut missing = Vec::new();
    for id in requested {
        match by_id.remove(id) {
            Some(payload) => selected.push(payload),
            None => missing.push(*id),
        }
    }

    if missing.is_empty() {
        Ok(selected)
    } else {
        Err(SyncError::MissingPayload {
            entity,
            ids: missing,
        })
    }
}

fn ensure_not_cancelled(entity: EntityType, cancel: Option<&watch::Receiver<bool>>) -> Result<()> {
    match cancel {
        Some(rx) if *rx.borrow() => Err(SyncError::Cancelled(entity)),
        _ => Ok(()),
    }
}

fn log_outcome(entity: EntityType, result: Result<SyncStats>) -> bool {
    log_outcome_ref(entity, &result);
    result.is_ok()
}

fn log_outcome_ref(entity: EntityType, result: &Result<SyncStats>) {
    match result {
        Ok(stats) if stats.is_noop() => debug!("[SyncEngine] {} already up to date", entity),
        Ok(stats) => info!("[SyncEngine] Synced {}", stats),
        Err(SyncError::Cancelled(_)) => info!("[SyncEngine] {} sync cancelled", entity),
        Err(e) => error!("[SyncEngine] {} sync failed: {}", entity, e),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
