use chrono::Utc;
use futures::stream::BoxStream;

use storefront_api::RecentSearchQuery;

use super::{shared, CatalogUseCases, Result};

impl CatalogUseCases {
    /// Records a submitted query. Blank queries are ignored.
    pub async fn insert_or_replace_recent_search(&self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        self.store
            .insert_or_replace_recent_search(query, Utc::now())
            .await?;
        Ok(())
    }

    /// Most recent first.
    pub fn observe_recent_search_queries(
        &self,
        limit: i64,
    ) -> BoxStream<'static, Result<Vec<RecentSearchQuery>>> {
        shared(self.store.observe_recent_search_queries(limit))
    }

    pub async fn clear_recent_searches(&self) -> Result<()> {
        self.store.clear_recent_searches().await?;
        Ok(())
    }

    /// Number of rows in the text index. Zero until the first population.
    pub fn observe_search_contents_count(&self) -> BoxStream<'static, Result<i64>> {
        shared(self.store.observe_search_contents_count())
    }
}
