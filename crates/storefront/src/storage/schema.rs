//! Relational schema for the local catalog
//!
//! Schema version 1. Any migration must keep the cascade deletes on
//! `shop_item_categories` and must keep category ids insertable without
//! their descriptive fields (shell categories).

use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::types::{Result, StorageError};

pub const SCHEMA_VERSION: i64 = 1;

pub const CATEGORIES_TABLE: &str = "categories";
pub const SHOP_ITEMS_TABLE: &str = "shop_items";
pub const SHOP_ITEM_CATEGORIES_TABLE: &str = "shop_item_categories";
pub const CATEGORY_FTS_TABLE: &str = "category_fts";
pub const SHOP_ITEM_FTS_TABLE: &str = "shop_item_fts";
pub const CHANGE_LIST_VERSIONS_TABLE: &str = "change_list_versions";

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        short_description TEXT NOT NULL DEFAULT '',
        long_description TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL DEFAULT '',
        image_url TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shop_items (
        id INTEGER PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        price REAL NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT '',
        stock INTEGER NOT NULL DEFAULT 0,
        images TEXT NOT NULL DEFAULT '[]',
        publish_date TEXT NOT NULL,
        item_type TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_shop_items_publish_date ON shop_items (publish_date)",
    r#"
    CREATE TABLE IF NOT EXISTS shop_item_categories (
        shop_item_id INTEGER NOT NULL REFERENCES shop_items (id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories (id) ON DELETE CASCADE,
        PRIMARY KEY (shop_item_id, category_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_shop_item_categories_category_id ON shop_item_categories (category_id)",
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS category_fts USING fts5(
        category_id UNINDEXED,
        name,
        short_description,
        long_description
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS shop_item_fts USING fts5(
        shop_item_id UNINDEXED,
        title,
        description
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS change_list_versions (
        entity TEXT PRIMARY KEY NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS search_index_state (
        id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
        populated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recent_search_queries (
        query TEXT PRIMARY KEY NOT NULL,
        queried_at TEXT NOT NULL
    )
    "#,
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
];

/// Creates all tables idempotently and records the schema version.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    for (i, statement) in SCHEMA_STATEMENTS.iter().enumerate() {
        debug!(
            "[schema] Executing statement {}/{}",
            i + 1,
            SCHEMA_STATEMENTS.len()
        );
        sqlx::query(statement).execute(pool).await?;
    }

    let existing = sqlx::query("SELECT MAX(version) AS version FROM schema_version")
        .fetch_one(pool)
        .await?
        .try_get::<Option<i64>, _>("version")?;

    match existing {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await?;
            info!("[schema] Initialized catalog schema v{}", SCHEMA_VERSION);
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(StorageError::Schema(format!(
                "database schema v{} is newer than supported v{}",
                version, SCHEMA_VERSION
            )));
        }
        Some(version) => {
            debug!("[schema] Found catalog schema v{}", version);
        }
    }

    Ok(())
}
