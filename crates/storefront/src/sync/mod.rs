//! Change-list driven incremental sync
//!
//! - `change_list`: filtering, de-duplication and partitioning of feed entries
//! - `engine`: per-entity sync passes and the joint `sync_all`
//! - `sync_stats`: what a pass did, for logs and callers

pub mod change_list;
pub mod engine;
pub mod sync_stats;

pub use change_list::{partition_change_list, PartitionedChanges};
pub use engine::{SyncEngine, SyncReport};
pub use sync_stats::SyncStats;

use storefront_api::{ApiError, EntityType};
use thiserror::Error;

use crate::storage::StorageError;

/// Why a per-type sync pass did not commit.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote catalog error: {0}")]
    Remote(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote catalog returned no {entity} payload for ids {ids:?}")]
    MissingPayload { entity: EntityType, ids: Vec<i64> },

    #[error("{0} sync cancelled before applying changes")]
    Cancelled(EntityType),
}

pub type Result<T> = std::result::Result<T, SyncError>;
