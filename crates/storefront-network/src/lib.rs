//! Remote catalog sources for the storefront
//!
//! - `client` - `HttpCatalogSource`, REST/JSON over reqwest
//! - `demo` - `DemoCatalogSource`, a catalog bundled into the binary
//! - `models` - response envelopes
//! - `di` - picks a source from configuration

pub mod client;
pub mod demo;
pub mod di;
pub mod models;

pub use client::HttpCatalogSource;
pub use demo::DemoCatalogSource;
pub use di::create_catalog_source;
