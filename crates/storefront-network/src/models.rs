use serde::{Deserialize, Serialize};

use storefront_api::{NetworkCategory, NetworkShopItem};

/// Every HTTP response body wraps its payload in `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResponse<T> {
    pub data: T,
}

/// Layout of the bundled demo catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoCatalog {
    pub categories: Vec<NetworkCategory>,
    pub shop_items: Vec<NetworkShopItem>,
}
