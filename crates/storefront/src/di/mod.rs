//! Composition root
//!
//! Wires the store, change tracker, sync engine, search index and use cases
//! around one remote catalog source. Frontends build a `Storefront` once and
//! hand out the pieces they need.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use storefront_api::CatalogNetworkDataSource;

use crate::config::StorefrontConfig;
use crate::preferences::{
    ChangeTracker, InMemoryPreferencesStore, JsonFilePreferencesStore, PreferencesStore,
};
use crate::search::SearchIndexMaintainer;
use crate::storage::SqliteCatalogStore;
use crate::sync::SyncEngine;
use crate::use_cases::CatalogUseCases;

pub struct Storefront {
    store: SqliteCatalogStore,
    tracker: Arc<ChangeTracker>,
    engine: Arc<SyncEngine>,
    search: SearchIndexMaintainer,
    use_cases: CatalogUseCases,
}

impl Storefront {
    /// Opens the configured database and preferences document.
    pub async fn open(
        config: &StorefrontConfig,
        source: Arc<dyn CatalogNetworkDataSource>,
    ) -> Result<Self> {
        let store = if config.uses_in_memory_database() {
            SqliteCatalogStore::open_in_memory()
                .await
                .context("Failed to open in-memory catalog")?
        } else {
            SqliteCatalogStore::open(&config.database_path, config.max_connections)
                .await
                .with_context(|| {
                    format!("Failed to open catalog {}", config.database_path.display())
                })?
        };

        let preferences: Arc<dyn PreferencesStore> =
            Arc::new(JsonFilePreferencesStore::new(&config.preferences_path));

        Self::assemble(store, preferences, source).await
    }

    /// Everything in memory; nothing survives the process.
    pub async fn in_memory(source: Arc<dyn CatalogNetworkDataSource>) -> Result<Self> {
        let store = SqliteCatalogStore::open_in_memory()
            .await
            .context("Failed to open in-memory catalog")?;
        Self::assemble(store, Arc::new(InMemoryPreferencesStore::new()), source).await
    }

    pub async fn assemble(
        store: SqliteCatalogStore,
        preferences: Arc<dyn PreferencesStore>,
        source: Arc<dyn CatalogNetworkDataSource>,
    ) -> Result<Self> {
        let source_name = source.source_name().to_string();
        let tracker = Arc::new(
            ChangeTracker::new(preferences, store.clone())
                .await
                .context("Failed to load user preferences")?,
        );
        let engine = Arc::new(SyncEngine::new(source, store.clone(), Arc::clone(&tracker)));
        let search = SearchIndexMaintainer::new(store.clone());
        let use_cases = CatalogUseCases::new(store.clone(), Arc::clone(&tracker), search.clone());

        info!("[Storefront] Ready with '{}' catalog source", source_name);
        Ok(Self {
            store,
            tracker,
            engine,
            search,
            use_cases,
        })
    }

    pub fn store(&self) -> &SqliteCatalogStore {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn search(&self) -> &SearchIndexMaintainer {
        &self.search
    }

    pub fn use_cases(&self) -> &CatalogUseCases {
        &self.use_cases
    }

    /// One scheduler tick: sync every entity type, then rebuild the search
    /// index if and only if the sync fully succeeded.
    pub async fn sync_and_index(&self) -> bool {
        let synced = self.engine.sync_all().await;
        self.index_after(synced).await
    }

    /// As [`sync_and_index`](Self::sync_and_index), abandoning entity types
    /// that have not started applying once `cancel` turns `true`.
    pub async fn sync_and_index_with(&self, cancel: watch::Receiver<bool>) -> bool {
        let synced = self.engine.sync_all_with(cancel).await;
        self.index_after(synced).await
    }

    async fn index_after(&self, synced: bool) -> bool {
        if !synced {
            warn!("[Storefront] Sync incomplete, keeping previous search index");
            return false;
        }
        match self.search.populate_fts_data().await {
            Ok(_) => true,
            Err(e) => {
                error!("[Storefront] Search index rebuild failed: {}", e);
                false
            }
        }
    }
}
