use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use storefront::config::SourceConfig;
use storefront_api::CatalogNetworkDataSource;

use crate::client::HttpCatalogSource;
use crate::demo::DemoCatalogSource;

/// Builds the remote catalog source named by the configuration.
pub fn create_catalog_source(config: &SourceConfig) -> Result<Arc<dyn CatalogNetworkDataSource>> {
    match config {
        SourceConfig::Demo => {
            info!("[CatalogSource] Using bundled demo catalog");
            let source = DemoCatalogSource::new().context("Failed to load demo catalog")?;
            Ok(Arc::new(source))
        }
        SourceConfig::Http {
            base_url,
            timeout_secs,
        } => {
            info!("[CatalogSource] Using HTTP catalog at {}", base_url);
            let source = HttpCatalogSource::new(base_url.clone(), Duration::from_secs(*timeout_secs))
                .with_context(|| format!("Failed to create HTTP client for {}", base_url))?;
            Ok(Arc::new(source))
        }
    }
}
