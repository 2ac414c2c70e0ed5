//! Reactive join layer
//!
//! Read API for presentation code. Every operation combines catalog queries
//! with the latest `UserData` and re-emits whenever either side changes. The
//! layer holds no state of its own.

mod followable_categories;
mod recent_search;
mod search_contents;
mod user_shop_items;

pub use search_contents::SEARCH_QUERY_MIN_LENGTH;

use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use thiserror::Error;

use crate::preferences::ChangeTracker;
use crate::search::SearchIndexMaintainer;
use crate::storage::{SqliteCatalogStore, StorageError};

/// Error carried inside use-case streams. Cloneable so the latest value of a
/// source can be re-emitted.
#[derive(Debug, Clone, Error)]
pub enum UseCaseError {
    #[error("Storage error: {0}")]
    Storage(Arc<StorageError>),
}

impl From<StorageError> for UseCaseError {
    fn from(e: StorageError) -> Self {
        UseCaseError::Storage(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, UseCaseError>;

#[derive(Clone)]
pub struct CatalogUseCases {
    store: SqliteCatalogStore,
    tracker: Arc<ChangeTracker>,
    search: SearchIndexMaintainer,
}

impl CatalogUseCases {
    pub fn new(
        store: SqliteCatalogStore,
        tracker: Arc<ChangeTracker>,
        search: SearchIndexMaintainer,
    ) -> Self {
        Self {
            store,
            tracker,
            search,
        }
    }
}

fn shared<T>(
    stream: BoxStream<'static, std::result::Result<T, StorageError>>,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
{
    stream.map(|item| item.map_err(UseCaseError::from)).boxed()
}

#[cfg(test)]
#[path = "use_cases_tests.rs"]
mod tests;
