use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use storefront_api::{
    ApiError, CatalogNetworkDataSource, CategoryId, ChangeListEntry, EntityType, NetworkCategory,
    NetworkShopItem, Result, ShopItemId,
};

/// Where the fake should fail the next requests until healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ChangeList(EntityType),
    Payload(EntityType),
}

#[derive(Default)]
struct FakeState {
    categories: BTreeMap<CategoryId, NetworkCategory>,
    shop_items: BTreeMap<ShopItemId, NetworkShopItem>,
    category_changes: Vec<ChangeListEntry>,
    shop_item_changes: Vec<ChangeListEntry>,
    category_version: i64,
    shop_item_version: i64,
    failures: HashSet<FailurePoint>,
    withheld: HashSet<(EntityType, i64)>,
    change_list_requests: Vec<(EntityType, Option<i64>)>,
    payload_requests: Vec<(EntityType, Vec<i64>)>,
}

impl FakeState {
    fn changes_mut(&mut self, entity: EntityType) -> &mut Vec<ChangeListEntry> {
        match entity {
            EntityType::Category => &mut self.category_changes,
            EntityType::ShopItem => &mut self.shop_item_changes,
        }
    }

    fn version_mut(&mut self, entity: EntityType) -> &mut i64 {
        match entity {
            EntityType::Category => &mut self.category_version,
            EntityType::ShopItem => &mut self.shop_item_version,
        }
    }

    fn record(&mut self, entity: EntityType, id: i64, is_delete: bool) -> i64 {
        let version = self.version_mut(entity);
        *version += 1;
        let version = *version;
        let entry = if is_delete {
            ChangeListEntry::delete(id, version)
        } else {
            ChangeListEntry::upsert(id, version)
        };
        self.changes_mut(entity).push(entry);
        version
    }

    fn check(&self, point: FailurePoint) -> Result<()> {
        if self.failures.contains(&point) {
            Err(ApiError::network(format!("injected failure at {:?}", point)))
        } else {
            Ok(())
        }
    }
}

/// In-memory remote catalog.
///
/// Every mutation appends a change-list entry with the next version for its
/// entity type, so the fake behaves like a server-side change feed.
#[derive(Default)]
pub struct FakeCatalogSource {
    state: Mutex<FakeState>,
}

impl FakeCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores the category and records an upsert. Returns its version.
    pub fn upsert_category(&self, category: NetworkCategory) -> i64 {
        let mut state = self.state();
        let id = category.id;
        state.categories.insert(id, category);
        state.record(EntityType::Category, id, false)
    }

    pub fn delete_category(&self, id: CategoryId) -> i64 {
        let mut state = self.state();
        state.categories.remove(&id);
        state.record(EntityType::Category, id, true)
    }

    pub fn upsert_shop_item(&self, item: NetworkShopItem) -> i64 {
        let mut state = self.state();
        let id = item.id;
        state.shop_items.insert(id, item);
        state.record(EntityType::ShopItem, id, false)
    }

    pub fn delete_shop_item(&self, id: ShopItemId) -> i64 {
        let mut state = self.state();
        state.shop_items.remove(&id);
        state.record(EntityType::ShopItem, id, true)
    }

    /// Stores a category payload without touching the change-list.
    pub fn put_category_payload(&self, category: NetworkCategory) {
        self.state().categories.insert(category.id, category);
    }

    /// Stores a shop item payload without touching the change-list.
    pub fn put_shop_item_payload(&self, item: NetworkShopItem) {
        self.state().shop_items.insert(item.id, item);
    }

    /// Appends a hand-written entry, e.g. to replay duplicates or jump versions.
    pub fn push_change_list_entry(&self, entity: EntityType, entry: ChangeListEntry) {
        let mut state = self.state();
        let version = state.version_mut(entity);
        *version = (*version).max(entry.change_list_version);
        state.changes_mut(entity).push(entry);
    }

    pub fn fail(&self, point: FailurePoint) {
        self.state().failures.insert(point);
    }

    pub fn heal(&self, point: FailurePoint) {
        self.state().failures.remove(&point);
    }

    /// Leaves the entity in the change-list but omits it from payload fetches.
    pub fn withhold_payload(&self, entity: EntityType, id: i64) {
        self.state().withheld.insert((entity, id));
    }

    pub fn release_payload(&self, entity: EntityType, id: i64) {
        self.state().withheld.remove(&(entity, id));
    }

    /// `(entity, after)` for every change-list request, in call order.
    pub fn change_list_requests(&self) -> Vec<(EntityType, Option<i64>)> {
        self.state().change_list_requests.clone()
    }

    /// `(entity, ids)` for every payload request, in call order.
    pub fn payload_requests(&self) -> Vec<(EntityType, Vec<i64>)> {
        self.state().payload_requests.clone()
    }

    pub fn clear_requests(&self) {
        let mut state = self.state();
        state.change_list_requests.clear();
        state.payload_requests.clear();
    }

    fn change_list(&self, entity: EntityType, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        let mut state = self.state();
        state.change_list_requests.push((entity, after));
        state.check(FailurePoint::ChangeList(entity))?;

        let after = after.unwrap_or(i64::MIN);
        Ok(state
            .changes_mut(entity)
            .iter()
            .filter(|entry| entry.change_list_version > after)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogNetworkDataSource for FakeCatalogSource {
    fn source_name(&self) -> &str {
        "fake"
    }

    async fn get_categories(&self, ids: Option<&[CategoryId]>) -> Result<Vec<NetworkCategory>> {
        let mut state = self.state();
        state.payload_requests.push((
            EntityType::Category,
            ids.map(|ids| ids.to_vec()).unwrap_or_default(),
        ));
        state.check(FailurePoint::Payload(EntityType::Category))?;

        Ok(state
            .categories
            .values()
            .filter(|c| ids.map_or(true, |ids| ids.contains(&c.id)))
            .filter(|c| !state.withheld.contains(&(EntityType::Category, c.id)))
            .cloned()
            .collect())
    }

    async fn get_shop_items(&self, ids: Option<&[ShopItemId]>) -> Result<Vec<NetworkShopItem>> {
        let mut state = self.state();
        state.payload_requests.push((
            EntityType::ShopItem,
            ids.map(|ids| ids.to_vec()).unwrap_or_default(),
        ));
        state.check(FailurePoint::Payload(EntityType::ShopItem))?;

        Ok(state
            .shop_items
            .values()
            .filter(|i| ids.map_or(true, |ids| ids.contains(&i.id)))
            .filter(|i| !state.withheld.contains(&(EntityType::ShopItem, i.id)))
            .cloned()
            .collect())
    }

    async fn get_category_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        self.change_list(EntityType::Category, after)
    }

    async fn get_shop_item_change_list(&self, after: Option<i64>) -> Result<Vec<ChangeListEntry>> {
        self.change_list(EntityType::ShopItem, after)
    }
}

pub fn network_category(id: CategoryId, name: &str) -> NetworkCategory {
    NetworkCategory {
        id,
        name: name.to_string(),
        short_description: format!("{} short description", name),
        long_description: format!("{} long description", name),
        url: format!("https://shop.example/categories/{}", id),
        image_url: format!("https://shop.example/categories/{}.png", id),
    }
}

/// Item published on `day` of March 2024, so larger days sort first.
pub fn network_shop_item(
    id: ShopItemId,
    title: &str,
    day: u32,
    categories: Vec<CategoryId>,
) -> NetworkShopItem {
    NetworkShopItem {
        id,
        title: title.to_string(),
        price: 10.0 + id as f64,
        description: format!("{} description", title),
        stock: 5,
        images: vec![format!("https://shop.example/items/{}.png", id)],
        publish_date: publish_date(day),
        item_type: "item".to_string(),
        categories,
    }
}

fn publish_date(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day.clamp(1, 28), 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
