//! Shared types for the storefront sync core.
//!
//! Everything that crosses a crate boundary lives here: catalog entities,
//! change-list feed entries, network payloads and the remote source trait,
//! per-user preference state, and the read models emitted to UI consumers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;
pub mod change_list;
pub mod network;
pub mod read_models;
pub mod ui_result;
pub mod user_data;

pub use catalog::{Category, CategoryId, ShopItem, ShopItemId};
pub use change_list::{ChangeListEntry, ChangeListVersions, EntityType};
pub use network::{CatalogNetworkDataSource, NetworkCategory, NetworkShopItem};
pub use read_models::{
    CategorySortField, FollowableCategory, RecentSearchQuery, SearchContents, ShopItemQuery,
    UserSearchResult, UserShopItem,
};
pub use ui_result::{AsResult, UiResult};
pub use user_data::{DarkThemeConfig, ThemeBrand, UserData};

/// Errors reported by the remote catalog boundary.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: i64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
