pub mod config;
pub mod di;
pub mod logging;
pub mod preferences;
pub mod reactive;
pub mod search;
pub mod storage;
pub mod sync;
pub mod testing;
pub mod use_cases;

pub use di::Storefront;
pub use storefront_api as api;
