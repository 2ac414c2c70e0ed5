use futures::stream::{BoxStream, StreamExt};

use storefront_api::{CategorySortField, FollowableCategory};

use super::{shared, CatalogUseCases, Result};
use crate::reactive::combine_latest;

impl CatalogUseCases {
    /// Every category with its follow state.
    ///
    /// `CategorySortField::None` keeps storage order; `Name` sorts by name.
    pub fn get_followable_categories(
        &self,
        sort_by: CategorySortField,
    ) -> BoxStream<'static, Result<Vec<FollowableCategory>>> {
        combine_latest(
            shared(self.store.observe_categories(None)),
            self.tracker.user_data(),
        )
        .map(move |(categories, user_data)| {
            let mut followable: Vec<FollowableCategory> = categories?
                .into_iter()
                .map(|category| FollowableCategory::new(category, &user_data))
                .collect();
            if sort_by == CategorySortField::Name {
                followable.sort_by(|a, b| a.category.name.cmp(&b.category.name));
            }
            Ok(followable)
        })
        .boxed()
    }
}
