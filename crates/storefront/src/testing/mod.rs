//! Test support shared by unit tests, integration tests and downstream crates
//!
//! - `FakeCatalogSource`: scriptable in-memory remote catalog with injectable
//!   failures and request recording
//! - `network_category` / `network_shop_item`: payload builders

pub mod fake_catalog_source;

pub use fake_catalog_source::{
    network_category, network_shop_item, FailurePoint, FakeCatalogSource,
};
