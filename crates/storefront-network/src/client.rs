use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

use storefront_api::{
    ApiError, CatalogNetworkDataSource, CategoryId, ChangeListEntry, NetworkCategory,
    NetworkShopItem, Result, ShopItemId,
};

use crate::models::NetworkResponse;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote catalog served over HTTP.
///
/// Endpoints, relative to the base URL:
/// - `GET categories?ids=1,2`
/// - `GET shop-items?ids=1,2`
/// - `GET changelists/categories?after=5`
/// - `GET changelists/shop-items?after=5`
pub struct HttpCatalogSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCatalogSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        debug!("[HttpCatalogSource] GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| describe_reqwest_error(e, &url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read body from {}: {}", url, e)))?;

        if !status.is_success() {
            error!(
                "[HttpCatalogSource] HTTP {} from {}: {}",
                status.as_u16(),
                url,
                body
            );
            return Err(ApiError::network(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                body
            )));
        }

        decode_envelope(&body)
            .map_err(|e| ApiError::decode(format!("Unexpected response from {}: {}", url, e)))
    }
}

/// Unwraps `{"data": ...}`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    serde_json::from_str::<NetworkResponse<T>>(body).map(|envelope| envelope.data)
}

fn ids_query(ids: Option<&[i64]>) -> Vec<(&'static str, String)> {
    match ids {
        Some(ids) => vec![(
            "ids",
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        )],
        None => Vec::new(),
    }
}

fn after_query(after: Option<i64>) -> Vec<(&'static str, String)> {
    after
        .map(|after| vec![("after", after.to_string())])
        .unwrap_or_default()
}

fn describe_reqwest_error(e: reqwest::Error, url: &str) -> ApiError {
    if e.is_timeout() {
        ApiError::network(format!("Request to {} timed out", url))
    } else if e.is_connect() {
        ApiError::network(format!("Could not connect to {}: {}", url, e))
    } else if e.is_decode() {
        ApiError::decode(format!("Unexpected response from {}: {}", url, e))
    } else {
        ApiError::network(format!("Request to {} failed: {}", url, e))
    }
}

#[async_trait]
impl CatalogNetworkDataSource for HttpCatalogSource {
    fn source_name(&self) -> &str {
        "http"
    }

    async fn get_categories(&self, ids: Option<&[CategoryId]>) -> Result<Vec<NetworkCategory>> {
        self.get("categories", &ids_query(ids)).await
    }

    async fn get_shop_items(&self, ids: Option<&[ShopItemId]>) -> Result<Vec<NetworkShopItem>> {
        self.get("shop-items", &ids_query(ids)).await
    }

    async fn get_category_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        self.get("changelists/categories", &after_query(after)).await
    }

    async fn get_shop_item_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        self.get("changelists/shop-items", &after_query(after)).await
    }
}
