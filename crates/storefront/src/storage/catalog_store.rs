//! SQLite-backed local catalog
//!
//! Holds categories, shop items, their associations, the full-text index,
//! the per-entity change-list watermark and recent search queries in one
//! database. Every data write that commits bumps a generation counter which
//! the `observe_*` streams use to re-run their queries.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use storefront_api::{
    Category, CategoryId, ChangeListVersions, EntityType, NetworkShopItem, RecentSearchQuery,
    ShopItem, ShopItemId, ShopItemQuery,
};

use super::schema::{self, initialize_schema};
use super::types::{Result, StorageError};
use crate::reactive::observe_query;

const MAX_RETRIES: u32 = 5;
const INITIAL_DELAY_MS: u64 = 10;

/// Keeps IN lists well below SQLite's bound-parameter limit.
const ID_CHUNK_SIZE: usize = 500;

/// Row of the category text index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFtsRow {
    pub category_id: CategoryId,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
}

/// Row of the shop item text index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopItemFtsRow {
    pub shop_item_id: ShopItemId,
    pub title: String,
    pub description: String,
}

/// What a change application did to the catalog tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub deleted: u64,
    pub upserted: u64,
    /// Categories created with only their id because an item referenced them.
    pub shell_categories: u64,
}

impl AppliedChanges {
    pub fn touched_data(&self) -> bool {
        self.deleted > 0 || self.upserted > 0 || self.shell_categories > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtsCounts {
    pub categories: i64,
    pub shop_items: i64,
}

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
    generation: Arc<watch::Sender<u64>>,
}

impl std::fmt::Debug for SqliteCatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalogStore")
            .field("generation", &*self.generation.borrow())
            .finish()
    }
}

impl SqliteCatalogStore {
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("[SqliteCatalogStore] Opened catalog at {}", path.display());
        Self::from_pool(pool).await
    }

    /// Private in-memory database. It lives as long as its single connection,
    /// so the pool never retires that connection.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        debug!("[SqliteCatalogStore] Opened in-memory catalog");
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        initialize_schema(&pool).await?;
        let (generation, _) = watch::channel(0u64);
        Ok(Self {
            pool,
            generation: Arc::new(generation),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Receiver for the data generation counter. The current value is marked
    /// as unseen so a fresh stream runs its query immediately.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        let mut rx = self.generation.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn current_generation(&self) -> u64 {
        *self.generation.borrow()
    }

    fn notify_changed(&self) {
        self.generation.send_modify(|generation| {
            *generation = generation.wrapping_add(1);
        });
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ---------------------------------------------------------------------
    // Catalog reads
    // ---------------------------------------------------------------------

    /// Categories in id order. `ids = None` returns every category.
    pub async fn get_categories(&self, ids: Option<&[CategoryId]>) -> Result<Vec<Category>> {
        let mut tx = self.pool.begin().await?;
        let categories = read_categories(&mut tx, ids).await?;
        tx.commit().await?;
        Ok(categories)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, short_description, long_description, url, image_url \
             FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    /// Items with their categories, newest publish date first.
    ///
    /// Items and their category rows are read in one transaction, so a
    /// concurrent sync is seen either entirely or not at all.
    pub async fn get_populated_shop_items(&self, query: &ShopItemQuery) -> Result<Vec<ShopItem>> {
        let mut tx = self.pool.begin().await?;
        let items = read_populated_shop_items(&mut tx, query).await?;
        tx.commit().await?;
        Ok(items)
    }

    /// Items for exactly these ids. Empty input returns an empty list rather
    /// than every item.
    pub async fn get_populated_shop_items_by_ids(&self, ids: &[ShopItemId]) -> Result<Vec<ShopItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.get_populated_shop_items(&ShopItemQuery::with_item_ids(ids.iter().copied()))
            .await
    }

    /// Every category and every populated item from the same snapshot.
    pub async fn get_catalog_snapshot(&self) -> Result<(Vec<Category>, Vec<ShopItem>)> {
        let mut tx = self.pool.begin().await?;
        let categories = read_categories(&mut tx, None).await?;
        let items = read_populated_shop_items(&mut tx, &ShopItemQuery::all()).await?;
        tx.commit().await?;
        Ok((categories, items))
    }

    pub async fn count_categories(&self) -> Result<i64> {
        self.count_rows(schema::CATEGORIES_TABLE).await
    }

    pub async fn count_shop_items(&self) -> Result<i64> {
        self.count_rows(schema::SHOP_ITEMS_TABLE).await
    }

    pub async fn count_shop_item_categories(&self) -> Result<i64> {
        self.count_rows(schema::SHOP_ITEM_CATEGORIES_TABLE).await
    }

    async fn count_rows(&self, table: &'static str) -> Result<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Associations whose item or category row is missing. Always zero while
    /// foreign keys are enforced.
    pub async fn count_dangling_associations(&self) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM shop_item_categories sic \
             WHERE NOT EXISTS (SELECT 1 FROM shop_items s WHERE s.id = sic.shop_item_id) \
                OR NOT EXISTS (SELECT 1 FROM categories c WHERE c.id = sic.category_id)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }

    // ---------------------------------------------------------------------
    // Change application
    // ---------------------------------------------------------------------

    /// Deletes, upserts and advances the category watermark to at least
    /// `new_version`, all in one transaction.
    #[tracing::instrument(skip(self, deleted_ids, upserts), fields(deleted = deleted_ids.len(), upserts = upserts.len()))]
    pub async fn apply_category_changes(
        &self,
        deleted_ids: &[CategoryId],
        upserts: &[Category],
        new_version: i64,
    ) -> Result<AppliedChanges> {
        let applied = retry_on_busy("apply_category_changes", move || {
            self.apply_category_changes_once(deleted_ids, upserts, new_version)
        })
        .await?;

        if applied.touched_data() {
            self.notify_changed();
        }
        Ok(applied)
    }

    async fn apply_category_changes_once(
        &self,
        deleted_ids: &[CategoryId],
        upserts: &[Category],
        new_version: i64,
    ) -> Result<AppliedChanges> {
        let mut tx = self.pool.begin().await?;
        let mut applied = AppliedChanges::default();

        for id in deleted_ids {
            applied.deleted += sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for category in upserts {
            upsert_category(&mut tx, category).await?;
            applied.upserted += 1;
        }

        advance_version(&mut tx, EntityType::Category, new_version).await?;
        tx.commit().await?;

        debug!(
            "[SqliteCatalogStore] Applied category changes: {} deleted, {} upserted, watermark >= {}",
            applied.deleted, applied.upserted, new_version
        );
        Ok(applied)
    }

    /// Deletes, upserts with association replacement and advances the shop
    /// item watermark to at least `new_version`, all in one transaction.
    ///
    /// Category ids referenced by an item but absent locally are inserted as
    /// shell categories (id only) so the association can exist.
    #[tracing::instrument(skip(self, deleted_ids, upserts), fields(deleted = deleted_ids.len(), upserts = upserts.len()))]
    pub async fn apply_shop_item_changes(
        &self,
        deleted_ids: &[ShopItemId],
        upserts: &[NetworkShopItem],
        new_version: i64,
    ) -> Result<AppliedChanges> {
        let applied = retry_on_busy("apply_shop_item_changes", move || {
            self.apply_shop_item_changes_once(deleted_ids, upserts, new_version)
        })
        .await?;

        if applied.touched_data() {
            self.notify_changed();
        }
        Ok(applied)
    }

    async fn apply_shop_item_changes_once(
        &self,
        deleted_ids: &[ShopItemId],
        upserts: &[NetworkShopItem],
        new_version: i64,
    ) -> Result<AppliedChanges> {
        let mut tx = self.pool.begin().await?;
        let mut applied = AppliedChanges::default();

        for id in deleted_ids {
            applied.deleted += sqlx::query("DELETE FROM shop_items WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for item in upserts {
            upsert_shop_item(&mut tx, item).await?;

            sqlx::query("DELETE FROM shop_item_categories WHERE shop_item_id = ?")
                .bind(item.id)
                .execute(&mut *tx)
                .await?;

            let category_ids: BTreeSet<CategoryId> = item.categories.iter().copied().collect();
            for category_id in category_ids {
                applied.shell_categories += sqlx::query("INSERT OR IGNORE INTO categories (id) VALUES (?)")
                    .bind(category_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();

                sqlx::query(
                    "INSERT OR IGNORE INTO shop_item_categories (shop_item_id, category_id) VALUES (?, ?)",
                )
                .bind(item.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            }
            applied.upserted += 1;
        }

        advance_version(&mut tx, EntityType::ShopItem, new_version).await?;
        tx.commit().await?;

        debug!(
            "[SqliteCatalogStore] Applied shop item changes: {} deleted, {} upserted, {} shell categories, watermark >= {}",
            applied.deleted, applied.upserted, applied.shell_categories, new_version
        );
        Ok(applied)
    }

    // ---------------------------------------------------------------------
    // Change-list watermark
    // ---------------------------------------------------------------------

    pub async fn get_change_list_versions(&self) -> Result<ChangeListVersions> {
        read_versions(&mut *self.pool.acquire().await?).await
    }

    /// Applies `transform` to the stored versions and persists the result.
    /// A stored version is never lowered.
    pub async fn update_change_list_versions<F>(&self, transform: F) -> Result<ChangeListVersions>
    where
        F: Fn(ChangeListVersions) -> ChangeListVersions,
    {
        let transform = &transform;
        retry_on_busy("update_change_list_versions", move || async move {
            let mut tx = self.pool.begin().await?;
            let current = read_versions(&mut tx).await?;
            let requested = transform(current);
            for entity in EntityType::ALL {
                advance_version(&mut tx, entity, requested.version_for(entity)).await?;
            }
            let stored = read_versions(&mut tx).await?;
            tx.commit().await?;
            Ok(stored)
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Full-text index
    // ---------------------------------------------------------------------

    /// Replaces the whole text index with the given rows and marks the index
    /// as populated, in one transaction.
    #[tracing::instrument(skip(self, categories, shop_items), fields(categories = categories.len(), shop_items = shop_items.len()))]
    pub async fn replace_fts_rows(
        &self,
        categories: &[CategoryFtsRow],
        shop_items: &[ShopItemFtsRow],
    ) -> Result<FtsCounts> {
        let counts = retry_on_busy("replace_fts_rows", move || {
            self.replace_fts_rows_once(categories, shop_items)
        })
        .await?;
        self.notify_changed();
        Ok(counts)
    }

    async fn replace_fts_rows_once(
        &self,
        categories: &[CategoryFtsRow],
        shop_items: &[ShopItemFtsRow],
    ) -> Result<FtsCounts> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM category_fts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM shop_item_fts").execute(&mut *tx).await?;

        for row in categories {
            sqlx::query(
                "INSERT INTO category_fts (category_id, name, short_description, long_description) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(row.category_id)
            .bind(&row.name)
            .bind(&row.short_description)
            .bind(&row.long_description)
            .execute(&mut *tx)
            .await?;
        }

        for row in shop_items {
            sqlx::query("INSERT INTO shop_item_fts (shop_item_id, title, description) VALUES (?, ?, ?)")
                .bind(row.shop_item_id)
                .bind(&row.title)
                .bind(&row.description)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO search_index_state (id, populated_at) VALUES (1, ?) \
             ON CONFLICT(id) DO UPDATE SET populated_at = excluded.populated_at",
        )
        .bind(format_timestamp(&Utc::now()))
        .execute(&mut *tx)
        .await?;

        let counts = fts_counts(&mut tx).await?;
        tx.commit().await?;
        Ok(counts)
    }

    pub async fn get_fts_counts(&self) -> Result<FtsCounts> {
        fts_counts(&mut *self.pool.acquire().await?).await
    }

    /// True once the text index has been populated at least once.
    pub async fn is_search_index_ready(&self) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM search_index_state")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    /// Category ids whose indexed text matches an FTS5 expression, best first.
    pub async fn search_category_ids(&self, match_expression: &str) -> Result<Vec<CategoryId>> {
        let rows = sqlx::query(
            "SELECT category_id FROM category_fts WHERE category_fts MATCH ? ORDER BY rank",
        )
        .bind(match_expression)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<i64, _>("category_id")?))
            .collect()
    }

    /// Shop item ids whose indexed text matches an FTS5 expression, best first.
    pub async fn search_shop_item_ids(&self, match_expression: &str) -> Result<Vec<ShopItemId>> {
        let rows = sqlx::query(
            "SELECT shop_item_id FROM shop_item_fts WHERE shop_item_fts MATCH ? ORDER BY rank",
        )
        .bind(match_expression)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<i64, _>("shop_item_id")?))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Recent searches
    // ---------------------------------------------------------------------

    pub async fn insert_or_replace_recent_search(
        &self,
        query: &str,
        queried_at: DateTime<Utc>,
    ) -> Result<()> {
        let stamp = format_timestamp(&queried_at);
        let stamp = stamp.as_str();
        retry_on_busy("insert_or_replace_recent_search", move || async move {
            sqlx::query(
                "INSERT INTO recent_search_queries (query, queried_at) VALUES (?, ?) \
                 ON CONFLICT(query) DO UPDATE SET queried_at = excluded.queried_at",
            )
            .bind(query)
            .bind(stamp)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await?;
        self.notify_changed();
        Ok(())
    }

    /// Most recent first.
    pub async fn get_recent_search_queries(&self, limit: i64) -> Result<Vec<RecentSearchQuery>> {
        let rows = sqlx::query(
            "SELECT query, queried_at FROM recent_search_queries \
             ORDER BY queried_at DESC, query LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let queried_at: String = row.try_get("queried_at")?;
                Ok(RecentSearchQuery {
                    query: row.try_get("query")?,
                    queried_at: parse_timestamp("recent_search_queries", &queried_at)?,
                })
            })
            .collect()
    }

    pub async fn clear_recent_searches(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM recent_search_queries")
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            self.notify_changed();
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    pub fn observe_categories(
        &self,
        ids: Option<Vec<CategoryId>>,
    ) -> BoxStream<'static, Result<Vec<Category>>> {
        let store = self.clone();
        observe_query(self.subscribe(), move || {
            let store = store.clone();
            let ids = ids.clone();
            async move { store.get_categories(ids.as_deref()).await }
        })
    }

    pub fn observe_populated_shop_items(
        &self,
        query: ShopItemQuery,
    ) -> BoxStream<'static, Result<Vec<ShopItem>>> {
        let store = self.clone();
        observe_query(self.subscribe(), move || {
            let store = store.clone();
            let query = query.clone();
            async move { store.get_populated_shop_items(&query).await }
        })
    }

    pub fn observe_recent_search_queries(
        &self,
        limit: i64,
    ) -> BoxStream<'static, Result<Vec<RecentSearchQuery>>> {
        let store = self.clone();
        observe_query(self.subscribe(), move || {
            let store = store.clone();
            async move { store.get_recent_search_queries(limit).await }
        })
    }

    /// Total number of rows in the text index.
    pub fn observe_search_contents_count(&self) -> BoxStream<'static, Result<i64>> {
        let store = self.clone();
        observe_query(self.subscribe(), move || {
            let store = store.clone();
            async move {
                let counts = store.get_fts_counts().await?;
                Ok(counts.categories + counts.shop_items)
            }
        })
    }
}

async fn retry_on_busy<T, F, Fut>(operation: &str, mut attempt_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_fn().await {
            Err(e) if e.is_busy() && attempt < MAX_RETRIES => {
                let delay_ms = INITIAL_DELAY_MS * (1 << (attempt - 1));
                warn!(
                    "[SqliteCatalogStore] Database locked during {} on attempt {}/{}, retrying in {}ms",
                    operation, attempt, MAX_RETRIES, delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            result => return result,
        }
    }
}

fn push_id_list<I>(qb: &mut QueryBuilder<'_, Sqlite>, ids: I)
where
    I: IntoIterator<Item = i64>,
{
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
}

async fn read_categories(
    conn: &mut SqliteConnection,
    ids: Option<&[CategoryId]>,
) -> Result<Vec<Category>> {
    let mut categories = Vec::new();
    match ids {
        None => {
            let rows = sqlx::query(
                "SELECT id, name, short_description, long_description, url, image_url \
                 FROM categories ORDER BY id",
            )
            .fetch_all(&mut *conn)
            .await?;
            for row in &rows {
                categories.push(category_from_row(row)?);
            }
        }
        Some(ids) => {
            for chunk in ids.chunks(ID_CHUNK_SIZE) {
                let mut qb = QueryBuilder::<Sqlite>::new(
                    "SELECT id, name, short_description, long_description, url, image_url \
                     FROM categories WHERE id IN (",
                );
                push_id_list(&mut qb, chunk.iter().copied());
                qb.push(")");
                for row in &qb.build().fetch_all(&mut *conn).await? {
                    categories.push(category_from_row(row)?);
                }
            }
            categories.sort_by_key(|c| c.id);
        }
    }
    Ok(categories)
}

/// Id filters are bound as one JSON array, so their size is not limited by
/// SQLite's bound-parameter cap.
async fn read_populated_shop_items(
    conn: &mut SqliteConnection,
    query: &ShopItemQuery,
) -> Result<Vec<ShopItem>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, title, price, description, stock, images, publish_date, item_type \
         FROM shop_items",
    );
    let mut has_where = false;

    if let Some(ids) = query.item_ids() {
        qb.push(" WHERE id IN (SELECT value FROM json_each(");
        qb.push_bind(serde_json::to_string(ids)?);
        qb.push("))");
        has_where = true;
    }

    if let Some(category_ids) = query.category_ids() {
        qb.push(if has_where { " AND" } else { " WHERE" });
        qb.push(
            " EXISTS (SELECT 1 FROM shop_item_categories sic \
             WHERE sic.shop_item_id = shop_items.id \
             AND sic.category_id IN (SELECT value FROM json_each(",
        );
        qb.push_bind(serde_json::to_string(category_ids)?);
        qb.push(")))");
    }

    qb.push(" ORDER BY publish_date DESC, id DESC");

    let rows = qb.build().fetch_all(&mut *conn).await?;
    let mut items = rows
        .iter()
        .map(shop_item_from_row)
        .collect::<Result<Vec<_>>>()?;
    attach_categories(conn, &mut items).await?;
    Ok(items)
}

async fn attach_categories(conn: &mut SqliteConnection, items: &mut [ShopItem]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let item_ids: Vec<ShopItemId> = items.iter().map(|item| item.id).collect();
    let mut by_item: HashMap<ShopItemId, Vec<Category>> = HashMap::new();

    for chunk in item_ids.chunks(ID_CHUNK_SIZE) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT sic.shop_item_id AS shop_item_id, c.id AS id, c.name AS name, \
             c.short_description AS short_description, c.long_description AS long_description, \
             c.url AS url, c.image_url AS image_url \
             FROM shop_item_categories sic JOIN categories c ON c.id = sic.category_id \
             WHERE sic.shop_item_id IN (",
        );
        push_id_list(&mut qb, chunk.iter().copied());
        qb.push(") ORDER BY c.id");

        for row in &qb.build().fetch_all(&mut *conn).await? {
            let item_id: ShopItemId = row.try_get("shop_item_id")?;
            by_item
                .entry(item_id)
                .or_default()
                .push(category_from_row(row)?);
        }
    }

    for item in items.iter_mut() {
        if let Some(categories) = by_item.remove(&item.id) {
            item.categories = categories;
        }
    }
    Ok(())
}

async fn upsert_category(conn: &mut SqliteConnection, category: &Category) -> Result<()> {
    sqlx::query(
        "INSERT INTO categories (id, name, short_description, long_description, url, image_url) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
            name = excluded.name, \
            short_description = excluded.short_description, \
            long_description = excluded.long_description, \
            url = excluded.url, \
            image_url = excluded.image_url",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.short_description)
    .bind(&category.long_description)
    .bind(&category.url)
    .bind(&category.image_url)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_shop_item(conn: &mut SqliteConnection, item: &NetworkShopItem) -> Result<()> {
    let images = serde_json::to_string(&item.images)?;
    sqlx::query(
        "INSERT INTO shop_items (id, title, price, description, stock, images, publish_date, item_type) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
            title = excluded.title, \
            price = excluded.price, \
            description = excluded.description, \
            stock = excluded.stock, \
            images = excluded.images, \
            publish_date = excluded.publish_date, \
            item_type = excluded.item_type",
    )
    .bind(item.id)
    .bind(&item.title)
    .bind(item.price)
    .bind(&item.description)
    .bind(item.stock)
    .bind(images)
    .bind(format_timestamp(&item.publish_date))
    .bind(&item.item_type)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn advance_version(conn: &mut SqliteConnection, entity: EntityType, version: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO change_list_versions (entity, version, updated_at) VALUES (?, ?, datetime('now')) \
         ON CONFLICT(entity) DO UPDATE SET \
            version = MAX(change_list_versions.version, excluded.version), \
            updated_at = excluded.updated_at",
    )
    .bind(entity.as_str())
    .bind(version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn read_versions(conn: &mut SqliteConnection) -> Result<ChangeListVersions> {
    let rows = sqlx::query("SELECT entity, version FROM change_list_versions")
        .fetch_all(&mut *conn)
        .await?;

    let mut versions = ChangeListVersions::default();
    for row in &rows {
        let entity: String = row.try_get("entity")?;
        let version: i64 = row.try_get("version")?;
        match EntityType::parse(&entity) {
            Some(entity) => versions = versions.advanced(entity, version),
            None => warn!(
                "[SqliteCatalogStore] Ignoring watermark for unknown entity '{}'",
                entity
            ),
        }
    }
    Ok(versions)
}

async fn fts_counts(conn: &mut SqliteConnection) -> Result<FtsCounts> {
    let row = sqlx::query(
        "SELECT (SELECT COUNT(*) FROM category_fts) AS categories, \
                (SELECT COUNT(*) FROM shop_item_fts) AS shop_items",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(FtsCounts {
        categories: row.try_get("categories")?,
        shop_items: row.try_get("shop_items")?,
    })
}

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        short_description: row.try_get("short_description")?,
        long_description: row.try_get("long_description")?,
        url: row.try_get("url")?,
        image_url: row.try_get("image_url")?,
    })
}

fn shop_item_from_row(row: &SqliteRow) -> Result<ShopItem> {
    let images: String = row.try_get("images")?;
    let publish_date: String = row.try_get("publish_date")?;
    Ok(ShopItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        price: row.try_get("price")?,
        description: row.try_get("description")?,
        stock: row.try_get("stock")?,
        images: serde_json::from_str(&images)?,
        publish_date: parse_timestamp(schema::SHOP_ITEMS_TABLE, &publish_date)?,
        item_type: row.try_get("item_type")?,
        categories: Vec::new(),
    })
}

/// Fixed-width UTC form so text ordering matches time ordering.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(table: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::invalid_data(table, format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
#[path = "catalog_store_tests.rs"]
mod tests;
